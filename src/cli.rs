use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "deedshift")]
#[command(version = "0.1.0")]
#[command(about = "Consensus-gated property ownership transfers", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding default.toml and per-environment overrides
    #[arg(long, default_value = "config", env = "DEEDSHIFT_CONFIG_DIR")]
    pub config_dir: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply database migrations
    Migrate,
    /// Open a transfer from the current owners to a new owner set
    Initiate {
        /// Property to transfer
        #[arg(long)]
        property: Uuid,
        /// Every current owner (must match live ownership exactly)
        #[arg(long, value_delimiter = ',', required = true)]
        old: Vec<Uuid>,
        /// Proposed new owners; may include current owners
        #[arg(long, value_delimiter = ',', required = true)]
        new: Vec<Uuid>,
    },
    /// Approve a pending transfer as one of its participants
    Approve(VoteArgs),
    /// Reject a pending transfer as one of its participants
    Reject(VoteArgs),
    /// List transfers for an owner or a property
    List(ListArgs),
}

#[derive(Args)]
pub struct VoteArgs {
    #[arg(long)]
    pub transfer: Uuid,
    #[arg(long)]
    pub owner: Uuid,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct ListArgs {
    /// Transfers this owner participates in
    #[arg(long)]
    pub owner: Option<Uuid>,
    /// All transfers of this property
    #[arg(long)]
    pub property: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_initiate_with_comma_lists() {
        let (p, a, b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let cli = Cli::try_parse_from([
            "deedshift".to_string(),
            "initiate".to_string(),
            "--property".to_string(),
            p.to_string(),
            "--old".to_string(),
            format!("{a},{b}"),
            "--new".to_string(),
            b.to_string(),
        ])
        .unwrap();

        match cli.command {
            Commands::Initiate { property, old, new } => {
                assert_eq!(property, p);
                assert_eq!(old, vec![a, b]);
                assert_eq!(new, vec![b]);
            }
            _ => panic!("expected initiate"),
        }
    }

    #[test]
    fn test_list_requires_exactly_one_filter() {
        assert!(Cli::try_parse_from(["deedshift", "list"]).is_err());

        let owner = Uuid::new_v4().to_string();
        let property = Uuid::new_v4().to_string();
        assert!(Cli::try_parse_from([
            "deedshift",
            "list",
            "--owner",
            owner.as_str(),
            "--property",
            property.as_str(),
        ])
        .is_err());
    }
}
