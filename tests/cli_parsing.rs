use clap::Parser;
use crewai_studio::cli::commands::crew::CrewCommands;
use crewai_studio::cli::commands::tool::ToolCommands;
use crewai_studio::cli::commands::transfer::TransferCommands;
use crewai_studio::cli::{Cli, Commands};

#[test]
fn test_parse_tool_add_with_params() {
    let cli = Cli::try_parse_from([
        "crewai-studio",
        "tools",
        "add",
        "SerperDevTool",
        "--description",
        "web search",
        "-p",
        "n_results=5",
    ])
    .unwrap();

    match cli.command {
        Some(Commands::Tools(args)) => match args.command {
            ToolCommands::Add {
                name,
                description,
                params,
            } => {
                assert_eq!(name, "SerperDevTool");
                assert_eq!(description.as_deref(), Some("web search"));
                assert_eq!(params, vec!["n_results=5".to_string()]);
            }
            other => panic!("Wrong tool command: {other:?}"),
        },
        other => panic!("Wrong top-level command: {other:?}"),
    }
}

#[test]
fn test_parse_crew_add_keeps_task_order() {
    let cli = Cli::try_parse_from([
        "crewai-studio",
        "crews",
        "add",
        "research-crew",
        "--task",
        "bbbb",
        "--task",
        "aaaa",
        "--agent",
        "cccc",
        "--memory",
        "true",
    ])
    .unwrap();

    let Some(Commands::Crews(args)) = cli.command else {
        panic!("Wrong top-level command");
    };
    let CrewCommands::Add { name, fields } = args.command else {
        panic!("Wrong crew command");
    };
    assert_eq!(name, "research-crew");
    assert_eq!(fields.tasks, vec!["bbbb".to_string(), "aaaa".to_string()]);
    assert_eq!(fields.agents, vec!["cccc".to_string()]);
    assert_eq!(fields.memory, Some(true));
}

#[test]
fn test_parse_transfer_export_default_path() {
    let cli = Cli::try_parse_from(["crewai-studio", "--json", "transfer", "export"]).unwrap();
    assert!(cli.json);
    let Some(Commands::Transfer(args)) = cli.command else {
        panic!("Wrong top-level command");
    };
    let TransferCommands::Export { path } = args.command else {
        panic!("Wrong transfer command");
    };
    assert_eq!(path.to_str(), Some("crewai-studio-export.json"));
}

#[test]
fn test_unknown_page_is_rejected() {
    assert!(Cli::try_parse_from(["crewai-studio", "dashboards"]).is_err());
}

#[test]
fn test_tool_delete_requires_id() {
    assert!(Cli::try_parse_from(["crewai-studio", "tools", "delete"]).is_err());
}
