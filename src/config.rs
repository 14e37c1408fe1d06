use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};
use moneywiz_core::{PlanError, ReferenceColumn};
use serde::Deserialize;

use crate::render::OutputFormat;
use crate::write_session::DEFAULT_SAMPLE_SIZE;

#[derive(Parser, Debug)]
#[command(name = "moneywiz", about = "Inspect and safely edit a MoneyWiz database", version)]
pub struct CliArgs {
    /// Path to config file
    #[arg(short, long, default_value = "moneywiz.toml", global = true)]
    pub config: String,

    /// Path to the MoneyWiz SQLite database (overrides config file)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Commit changes; without it write commands only print their plan
    #[arg(long, global = true)]
    pub apply: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,

    /// Log level (overrides config file)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List users
    Users,
    /// List accounts
    Accounts {
        #[arg(long)]
        user: Option<i64>,
    },
    /// List categories of a user
    Categories {
        #[arg(long)]
        user: i64,
        /// Show the parent chain, e.g. "Food > Groceries"
        #[arg(long)]
        full_name: bool,
    },
    /// List payees
    Payees {
        #[arg(long)]
        user: Option<i64>,
        #[arg(long)]
        sort_by_name: bool,
    },
    /// List tags
    Tags {
        #[arg(long)]
        user: Option<i64>,
    },
    /// List investment holdings of an account
    Holdings {
        #[arg(long)]
        account: i64,
    },
    /// List transactions, newest first
    Transactions {
        #[arg(long)]
        account: Option<i64>,
        /// Max rows to output (0 = no limit)
        #[arg(long, default_value_t = 0)]
        limit: usize,
        /// Include transactions up to this date (YYYY-MM-DD)
        #[arg(long)]
        until: Option<String>,
        #[arg(long)]
        with_categories: bool,
        #[arg(long)]
        with_tags: bool,
        /// Comma-separated columns for table output
        #[arg(long)]
        fields: Option<String>,
        /// Print the available field names and exit
        #[arg(long)]
        list_fields: bool,
        #[arg(long)]
        all_fields: bool,
    },
    /// Show one raw row
    #[command(group(ArgGroup::new("key").required(true).args(["id", "gid"])))]
    Record {
        #[arg(long)]
        id: Option<i64>,
        #[arg(long)]
        gid: Option<String>,
    },
    /// Count rows per kind
    Summary,
    /// Insert a ZSYNCOBJECT row of a type name
    Insert {
        #[arg(long = "type")]
        type_name: String,
        /// JSON object of column: value
        #[arg(long)]
        fields: Option<String>,
    },
    /// Update a ZSYNCOBJECT row by primary key
    Update {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        fields: String,
    },
    /// Delete a ZSYNCOBJECT row by primary key
    Delete {
        #[arg(long)]
        id: i64,
    },
    /// Delete a row only if nothing references it
    SafeDelete {
        #[arg(long)]
        id: i64,
    },
    /// Rename an account, category, payee, tag or transaction
    Rename {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        name: String,
        /// Column to write instead of the type's name column
        #[arg(long)]
        name_field: Option<String>,
    },
    /// Replace the category splits of a transaction
    AssignCategories {
        #[arg(long)]
        tx: i64,
        /// JSON array of [category_id, amount]
        #[arg(long)]
        splits: String,
    },
    /// Replace the tags of a transaction
    AssignTags {
        #[arg(long)]
        tx: i64,
        /// JSON array of tag ids
        #[arg(long)]
        tags: String,
    },
    /// Link a refund to the withdraw it refunds
    LinkRefund {
        #[arg(long)]
        refund: i64,
        #[arg(long)]
        withdraw: i64,
    },
    /// Move transactions off a payee onto payees named after their descriptions
    ReassignPayees {
        #[arg(long)]
        from_payee_id: i64,
        /// Only print the summary
        #[arg(long)]
        quiet: bool,
        #[arg(long)]
        show_plan: bool,
    },
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_database")]
    pub database: DatabaseConfig,

    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,

    #[serde(default = "default_safe_delete")]
    pub safe_delete: SafeDeleteConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SafeDeleteConfig {
    /// Extra `TABLE.COLUMN` entries checked before a delete.
    #[serde(default)]
    pub references: Vec<String>,

    /// When true, `references` replaces the built-in list instead of extending it.
    #[serde(default)]
    pub replace_builtin: bool,

    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
}

fn default_database() -> DatabaseConfig {
    DatabaseConfig { path: default_db_path() }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("tests/test_db.sqlite")
}

fn default_logging() -> LoggingConfig {
    LoggingConfig {
        level: default_log_level(),
        json: false,
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_safe_delete() -> SafeDeleteConfig {
    SafeDeleteConfig {
        references: Vec::new(),
        replace_builtin: false,
        sample_size: default_sample_size(),
    }
}

fn default_sample_size() -> usize {
    DEFAULT_SAMPLE_SIZE
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: default_database(),
            logging: default_logging(),
            safe_delete: default_safe_delete(),
        }
    }
}

impl Config {
    pub fn load(cli: &CliArgs) -> Self {
        let mut config = match std::fs::read_to_string(&cli.config) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                eprintln!("Warning: Failed to parse config file: {}", e);
                Config::default()
            }),
            Err(_) => Config::default(),
        };

        // CLI overrides
        if let Some(ref db) = cli.db {
            config.database.path = db.clone();
        }
        if let Some(ref level) = cli.log_level {
            config.logging.level = level.clone();
        }

        config
    }
}

impl SafeDeleteConfig {
    /// The columns scanned before a safe delete.
    pub fn reference_columns(&self) -> Result<Vec<ReferenceColumn>, PlanError> {
        let mut columns = if self.replace_builtin {
            Vec::new()
        } else {
            ReferenceColumn::builtin()
        };
        for entry in &self.references {
            let column = ReferenceColumn::parse(entry)?;
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
        Ok(columns)
    }
}
