use crate::command::CommandUnit;
use crate::error::ParseError;
use crate::parser;

/// Parses a command-unit into its pipeline stages.
///
/// Without a `|` the unit is a single stage, which may be empty. With one or
/// more pipes every stage is parsed on its own and none of them may be empty.
/// Stages keep their own redirections; the executor applies them after the
/// inter-stage pipe wiring, so an explicit redirection wins over the pipe.
pub fn parse_unit(unit: &str) -> Result<CommandUnit, ParseError> {
    if !unit.contains('|') {
        return Ok(CommandUnit::single(parser::parse_command(unit)?));
    }

    let mut stages = Vec::new();
    for (index, segment) in unit.split('|').enumerate() {
        let command = parser::parse_command(segment)?;
        if command.is_empty() {
            return Err(ParseError::EmptyStage { index });
        }
        stages.push(command);
    }
    tracing::debug!(stages = stages.len(), "parsed pipeline");
    Ok(CommandUnit { stages })
}
