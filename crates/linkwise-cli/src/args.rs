//! Command-line arguments.

use std::path::PathBuf;

use anyhow::{bail, Context};

pub const USAGE: &str = "\
Linkwise: link named entities to Wikipedia, Wikidata and DBpedia

Usage: linkwise <command> [options]

Commands:
  link [options] (--file ENTITIES.json | NAME...)   Run the linking pipeline
  config [--config FILE] [--language L]             Print the effective configuration
  help                                              Show this help message

Options:
  --language L        Target language (overrides the config)
  --config FILE       Linker configuration (JSON)
  --llm-config FILE   LLM configuration (JSON); API keys fall back to the environment
  --synonyms FILE     Dictionary of synonyms and translations instead of an LLM
  --output FILE       Write the result to FILE instead of stdout
  --file FILE         Entities as a JSON array of names or objects";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkArgs {
    pub language: Option<String>,
    pub config: Option<PathBuf>,
    pub llm_config: Option<PathBuf>,
    pub synonyms: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub file: Option<PathBuf>,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Link(LinkArgs),
    Config(LinkArgs),
    Help,
}

/// Parse `args` without the program name.
pub fn parse(args: &[String]) -> anyhow::Result<Command> {
    let Some(command) = args.first() else {
        return Ok(Command::Help);
    };
    match command.as_str() {
        "--help" | "-h" | "help" => Ok(Command::Help),
        "link" => {
            let parsed = parse_options(&args[1..])?;
            if parsed.file.is_none() && parsed.names.is_empty() {
                bail!("link needs --file or at least one entity name");
            }
            if parsed.file.is_some() && !parsed.names.is_empty() {
                bail!("link takes either --file or entity names, not both");
            }
            Ok(Command::Link(parsed))
        }
        "config" => {
            let parsed = parse_options(&args[1..])?;
            if !parsed.names.is_empty() {
                bail!("config takes no positional arguments");
            }
            Ok(Command::Config(parsed))
        }
        other => bail!("Unknown command: {}. Use 'linkwise help' for usage.", other),
    }
}

fn parse_options(args: &[String]) -> anyhow::Result<LinkArgs> {
    let mut parsed = LinkArgs::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .with_context(|| format!("{} needs a value", flag))
        };
        match arg.as_str() {
            "--language" => parsed.language = Some(value(arg)?),
            "--config" => parsed.config = Some(PathBuf::from(value(arg)?)),
            "--llm-config" => parsed.llm_config = Some(PathBuf::from(value(arg)?)),
            "--synonyms" => parsed.synonyms = Some(PathBuf::from(value(arg)?)),
            "--output" | "-o" => parsed.output = Some(PathBuf::from(value(arg)?)),
            "--file" | "-f" => parsed.file = Some(PathBuf::from(value(arg)?)),
            flag if flag.starts_with('-') => bail!("Unknown option: {}", flag),
            name => parsed.names.push(name.to_string()),
        }
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_link_with_names() {
        let command = parse(&args(&["link", "--language", "en", "Zugspitze", "Q937"])).unwrap();
        let Command::Link(link) = command else {
            panic!("expected link command");
        };
        assert_eq!(link.language.as_deref(), Some("en"));
        assert_eq!(link.names, vec!["Zugspitze", "Q937"]);
        assert!(link.file.is_none());
    }

    #[test]
    fn test_link_with_file_and_output() {
        let command = parse(&args(&["link", "-f", "in.json", "--output", "out.json"])).unwrap();
        assert_eq!(
            command,
            Command::Link(LinkArgs {
                file: Some(PathBuf::from("in.json")),
                output: Some(PathBuf::from("out.json")),
                ..LinkArgs::default()
            })
        );
    }

    #[test]
    fn test_invalid_invocations() {
        assert!(parse(&args(&["link"])).is_err());
        assert!(parse(&args(&["link", "--file", "in.json", "Zugspitze"])).is_err());
        assert!(parse(&args(&["link", "--language"])).is_err());
        assert!(parse(&args(&["link", "--verbose", "Zugspitze"])).is_err());
        assert!(parse(&args(&["serve"])).is_err());
        assert!(parse(&args(&["config", "extra"])).is_err());
    }

    #[test]
    fn test_help() {
        assert_eq!(parse(&[]).unwrap(), Command::Help);
        assert_eq!(parse(&args(&["-h"])).unwrap(), Command::Help);
    }
}
