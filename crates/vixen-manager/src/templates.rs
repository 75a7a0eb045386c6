//! Default project files written when the bot project lacks them.

/// Placeholders an operator must replace before the bot can log in.
pub const ENV_PLACEHOLDERS: [&str; 2] = ["your_discord_token_here", "your_client_id_here"];

pub const ENV_FILE: &str = r"# Discord Bot Configuration
DISCORD_TOKEN=your_discord_token_here
CLIENT_ID=your_client_id_here
COMMAND_PREFIX=!
DEV_GUILD_ID=your_development_server_id_here  # Optional, for faster slash command updates

# Feature Flags
REGISTER_COMMANDS=true
ENABLE_PLURALKIT=true

# API Endpoints
PLURALKIT_API=https://api.pluralkit.me/v2

# Admin Configuration
OWNER_IDS=your_discord_id_here  # Comma-separated list of Discord user IDs

# Data Settings
DATA_PATH=./data
";

pub const PACKAGE_JSON: &str = r#"{
  "name": "the-vixen",
  "version": "1.0.0",
  "description": "A TypeScript Discord bot for Pathfinder 2E with dice rolling and PluralKit integration",
  "main": "dist/index.js",
  "scripts": {
    "build": "tsc",
    "start": "node dist/index.js",
    "dev": "ts-node src/index.ts",
    "watch": "tsc --watch"
  },
  "keywords": [
    "discord",
    "bot",
    "pathfinder",
    "dice",
    "pluralkit"
  ],
  "author": "",
  "license": "MIT",
  "dependencies": {
    "discord.js": "^14.11.0",
    "dotenv": "^16.0.3"
  },
  "devDependencies": {
    "@types/node": "^18.16.3",
    "ts-node": "^10.9.1",
    "typescript": "^5.0.4"
  }
}
"#;

pub const TSCONFIG_JSON: &str = r#"{
  "compilerOptions": {
    "target": "ES2020",
    "module": "commonjs",
    "lib": ["ES2020"],
    "outDir": "./dist",
    "rootDir": "./src",
    "strict": true,
    "esModuleInterop": true,
    "skipLibCheck": true,
    "forceConsistentCasingInFileNames": true,
    "resolveJsonModule": true,
    "moduleResolution": "node",
    "declaration": true,
    "sourceMap": true
  },
  "include": [
    "src/**/*"
  ],
  "exclude": [
    "node_modules",
    "**/*.test.ts"
  ]
}
"#;

/// Placeholders still present in `.env` content.
pub fn unfilled_placeholders(env_content: &str) -> Vec<&'static str> {
    ENV_PLACEHOLDERS
        .into_iter()
        .filter(|placeholder| env_content.contains(placeholder))
        .collect()
}
