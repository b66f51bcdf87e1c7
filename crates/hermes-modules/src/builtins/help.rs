use crate::registry::CommandSummary;
use async_trait::async_trait;
use hermes_core::error::HermesError;
use hermes_core::message::{Invocation, OutgoingMessage};
use hermes_core::traits::Module;

/// Lists the registered commands.
pub struct HelpModule {
    text: String,
}

impl HelpModule {
    /// `others` are the modules registered before help; help adds itself.
    pub fn new(prefix: String, mut others: Vec<CommandSummary>) -> Self {
        others.push(CommandSummary {
            name: "help".into(),
            usage: String::new(),
            description: "List available commands".into(),
            aliases: Vec::new(),
        });
        Self {
            text: render(&prefix, &others),
        }
    }
}

fn render(prefix: &str, commands: &[CommandSummary]) -> String {
    let mut out = String::from("*Commands*\n");
    for cmd in commands {
        out.push_str(&format!("\n{prefix}{}", cmd.name));
        if !cmd.usage.is_empty() {
            out.push_str(&format!(" {}", cmd.usage));
        }
        out.push_str(&format!(" - {}", cmd.description));
        if !cmd.aliases.is_empty() {
            out.push_str(&format!(" (also: {})", cmd.aliases.join(", ")));
        }
    }
    out
}

#[async_trait]
impl Module for HelpModule {
    fn name(&self) -> &str {
        "help"
    }

    fn description(&self) -> &str {
        "List available commands"
    }

    async fn handle(
        &self,
        _invocation: &Invocation,
    ) -> Result<Option<OutgoingMessage>, HermesError> {
        Ok(Some(OutgoingMessage::text(self.text.clone())))
    }
}
