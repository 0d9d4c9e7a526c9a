//! Interface de linha de comando do AI Hero baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] para projetos,
//! workflows e automações, além das flags globais (--verbose, --config).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use aihero::automation::AutomationKind;

/// AI Hero: cliente de linha de comando para projetos, workflows e automações.
#[derive(Debug, Parser)]
#[command(name = "aihero", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Caminho do arquivo de configuração (padrão: `aihero.toml`).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

fn parse_kind(raw: &str) -> Result<AutomationKind, String> {
    raw.parse().map_err(|e: aihero::AiHeroError| e.to_string())
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Mostra os detalhes de um projeto.
    Project {
        /// UUID do projeto.
        project_id: String,
    },

    /// Lista os workflows de um projeto.
    Workflows { project_id: String },

    /// Mostra um workflow.
    Workflow {
        project_id: String,
        workflow_id: String,
    },

    /// Dispara um workflow e aguarda até que termine.
    Launch {
        project_id: String,
        workflow_id: String,

        /// Prazo em segundos (padrão vem da configuração).
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Submete um job a uma automação e aguarda até `done`.
    Job {
        automation_id: String,

        /// Tipo da automação, ex.: `tag_short_text`.
        #[arg(long, value_parser = parse_kind)]
        kind: AutomationKind,

        /// Corpo do job em JSON.
        #[arg(long)]
        body: String,

        /// Prazo em segundos (padrão vem da configuração).
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Executa uma inferência única (sem polling).
    Infer {
        automation_id: String,

        /// Nome da tarefa, ex.: `predict`.
        task: String,

        #[arg(long, value_parser = parse_kind)]
        kind: AutomationKind,

        /// Payload em JSON.
        #[arg(long)]
        payload: String,
    },

    /// Mostra a definição de uma automação.
    Definition {
        automation_id: String,

        #[arg(long, value_parser = parse_kind)]
        kind: AutomationKind,
    },

    /// Envia um arquivo local para o projeto.
    Upload { project_id: String, file: PathBuf },

    /// Abre a aplicação Streamlit do PromptCraft.
    #[command(alias = "pc")]
    Promptcraft {
        /// Nome da aplicação dentro de `promptcraft/`.
        #[arg(long, default_value = "completions")]
        app: String,

        /// Diretório que contém `promptcraft/`.
        #[arg(long, default_value = "apps")]
        apps_dir: PathBuf,
    },
}
