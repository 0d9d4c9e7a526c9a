//! Interface de terminal do AI Hero: spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`PollProgress`] acompanha visualmente o
//! polling de um job ou workflow no terminal.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::error::AiHeroError;
use crate::poll::{PollObserver, PollPhase, PollRecord, PollTick};

/// Indicador visual de progresso para um polling no terminal.
///
/// Exibe um spinner animado a cada consulta e mensagens coloridas para
/// sucesso (verde), falha (vermelho) e estados intermediários (amarelo).
pub struct PollProgress {
    // Spinner do indicatif.
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl PollProgress {
    /// Inicia o spinner com a descrição do recurso acompanhado.
    pub fn start(description: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(format!("INIT: {description}"));
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Finaliza o spinner com uma mensagem de sucesso.
    pub fn complete(&self, summary: &str) {
        self.pb.finish_and_clear();
        println!("  {} {summary}", self.green.apply_to("✓"));
    }

    /// Finaliza o spinner e exibe o erro em vermelho.
    pub fn fail(&self, err: &AiHeroError) {
        self.pb.finish_and_clear();
        println!("  {} {} error: {err}", self.red.apply_to("✗"), err.kind());
    }

    /// Imprime o registro do polling (tentativas, histórico, duração).
    pub fn print_record(&self, record: &PollRecord) {
        println!();
        println!("{}", self.yellow.apply_to("─── Poll Record ───"));
        println!(
            "{}",
            serde_json::to_string_pretty(record).unwrap_or_default()
        );
    }
}

impl PollObserver for PollProgress {
    fn on_tick(&self, tick: &PollTick<'_>) {
        let state = tick.state.unwrap_or("?");
        let state = match tick.phase {
            PollPhase::Done => self.green.apply_to(state).to_string(),
            PollPhase::Error => self.red.apply_to(state).to_string(),
            PollPhase::Pending | PollPhase::Unknown => self.yellow.apply_to(state).to_string(),
        };
        self.pb.set_message(format!(
            "{} #{} {state} ({:.1}s)",
            tick.id,
            tick.attempt,
            tick.elapsed.as_secs_f64()
        ));
    }
}

/// Imprime um valor qualquer como JSON formatado sob um título.
pub fn print_json<S: Serialize>(title: &str, value: &S) {
    let title_style = Style::new().cyan().bold();
    println!("{}", title_style.apply_to(format!("─── {title} ───")));
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}
