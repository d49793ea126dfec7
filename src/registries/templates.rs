use serde_json::{Value, json};

use crate::data::{FileWritePlan, ProjectConfig, ProjectType};

/// Replaced by the project name in every template file.
pub const PROJECT_NAME_PLACEHOLDER: &str = "{project_name}";

const MANIFEST_FILE: &str = "package.json";

/// A starter project: a dependency manifest plus literal source files.
#[derive(Debug, Clone)]
pub struct ProjectTemplate {
    kind: ProjectType,
    manifest: Value,
    files: &'static [(&'static str, &'static str)],
}

/// Looks up the template for a project type.
///
/// Only Next.js has its own template; every other type gets the React one.
pub fn template_for(project_type: ProjectType) -> ProjectTemplate {
    match project_type {
        ProjectType::Nextjs => ProjectTemplate {
            kind: ProjectType::Nextjs,
            manifest: json!({
                "name": PROJECT_NAME_PLACEHOLDER,
                "version": "0.1.0",
                "private": true,
                "scripts": {
                    "dev": "next dev",
                    "build": "next build",
                    "start": "next start",
                    "lint": "next lint"
                },
                "dependencies": {
                    "next": "14.0.0",
                    "react": "^18",
                    "react-dom": "^18"
                },
                "devDependencies": {
                    "typescript": "^5",
                    "@types/node": "^20",
                    "@types/react": "^18",
                    "@types/react-dom": "^18",
                    "eslint": "^8",
                    "eslint-config-next": "14.0.0"
                }
            }),
            files: NEXTJS_FILES,
        },
        _ => ProjectTemplate {
            kind: ProjectType::React,
            manifest: json!({
                "name": PROJECT_NAME_PLACEHOLDER,
                "version": "0.1.0",
                "private": true,
                "scripts": {
                    "dev": "react-scripts start",
                    "start": "react-scripts start",
                    "build": "react-scripts build",
                    "test": "react-scripts test",
                    "eject": "react-scripts eject"
                },
                "dependencies": {
                    "react": "^18.2.0",
                    "react-dom": "^18.2.0",
                    "react-scripts": "5.0.1"
                },
                "devDependencies": {
                    "typescript": "^4.9.5"
                }
            }),
            files: REACT_FILES,
        },
    }
}

impl ProjectTemplate {
    /// The project type whose files this template actually contains.
    pub fn kind(&self) -> ProjectType {
        self.kind
    }

    /// Renders the template for `config` as a plan of files to create.
    pub fn render(&self, config: &ProjectConfig) -> FileWritePlan {
        let mut plan = FileWritePlan::new();
        plan.insert(MANIFEST_FILE, self.render_manifest(config));
        for (path, content) in self.files {
            plan.insert(*path, content.replace(PROJECT_NAME_PLACEHOLDER, &config.name));
        }
        plan
    }

    fn render_manifest(&self, config: &ProjectConfig) -> String {
        let mut manifest = self.manifest.clone();
        manifest["name"] = json!(config.name);
        manifest["description"] = json!(config.description);

        if config.uses("tailwindcss") {
            manifest["devDependencies"]["tailwindcss"] = json!("^3.3.0");
            manifest["devDependencies"]["autoprefixer"] = json!("^10.4.16");
            manifest["devDependencies"]["postcss"] = json!("^8.4.31");
        }
        if config.uses("typescript") && self.kind != ProjectType::Nextjs {
            manifest["devDependencies"]["typescript"] = json!("^5.0.0");
        }

        let mut text =
            serde_json::to_string_pretty(&manifest).unwrap_or_else(|_| manifest.to_string());
        text.push('\n');
        text
    }
}

const NEXTJS_FILES: &[(&str, &str)] = &[
    (
        "app/page.tsx",
        r#"import React from 'react';

export default function Home() {
  return (
    <main className="container mx-auto px-4 py-8">
      <h1 className="text-4xl font-bold text-center mb-8">
        Welcome to {project_name}
      </h1>
      <p className="text-lg text-center text-gray-600">
        Your Next.js application is ready!
      </p>
    </main>
  );
}
"#,
    ),
    (
        "app/layout.tsx",
        r#"import React from 'react';
import './globals.css';

export const metadata = {
  title: '{project_name}',
  description: 'Generated by autonomy',
};

export default function RootLayout({
  children,
}: {
  children: React.ReactNode;
}) {
  return (
    <html lang="en">
      <body>{children}</body>
    </html>
  );
}
"#,
    ),
    (
        "app/globals.css",
        r#"@tailwind base;
@tailwind components;
@tailwind utilities;

body {
  font-family: system-ui, sans-serif;
}
"#,
    ),
    (
        "next.config.js",
        r#"/** @type {import('next').NextConfig} */
const nextConfig = {};

module.exports = nextConfig;
"#,
    ),
    (
        "tailwind.config.js",
        r#"/** @type {import('tailwindcss').Config} */
module.exports = {
  content: [
    './pages/**/*.{js,ts,jsx,tsx,mdx}',
    './components/**/*.{js,ts,jsx,tsx,mdx}',
    './app/**/*.{js,ts,jsx,tsx,mdx}',
  ],
  theme: {
    extend: {},
  },
  plugins: [],
};
"#,
    ),
    (
        "tsconfig.json",
        r#"{
  "compilerOptions": {
    "target": "es5",
    "lib": ["dom", "dom.iterable", "esnext"],
    "allowJs": true,
    "skipLibCheck": true,
    "strict": true,
    "forceConsistentCasingInFileNames": true,
    "noEmit": true,
    "esModuleInterop": true,
    "module": "esnext",
    "moduleResolution": "node",
    "resolveJsonModule": true,
    "isolatedModules": true,
    "jsx": "preserve",
    "incremental": true,
    "plugins": [{ "name": "next" }],
    "paths": {
      "@/*": ["./*"]
    }
  },
  "include": ["next-env.d.ts", "**/*.ts", "**/*.tsx", ".next/types/**/*.ts"],
  "exclude": ["node_modules"]
}
"#,
    ),
];

const REACT_FILES: &[(&str, &str)] = &[
    (
        "public/index.html",
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>{project_name}</title>
  </head>
  <body>
    <div id="root"></div>
  </body>
</html>
"#,
    ),
    (
        "src/index.js",
        r#"import React from 'react';
import ReactDOM from 'react-dom/client';
import App from './App';

const root = ReactDOM.createRoot(document.getElementById('root'));
root.render(<App />);
"#,
    ),
    (
        "src/App.js",
        r#"import React from 'react';
import './App.css';

function App() {
  return (
    <div className="App">
      <header className="App-header">
        <h1>Welcome to {project_name}</h1>
        <p>Your React application is ready!</p>
      </header>
    </div>
  );
}

export default App;
"#,
    ),
    (
        "src/App.css",
        r#".App {
  text-align: center;
}

.App-header {
  background-color: #282c34;
  padding: 20px;
  color: white;
  min-height: 100vh;
  display: flex;
  flex-direction: column;
  align-items: center;
  justify-content: center;
}
"#,
    ),
];
