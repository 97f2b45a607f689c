/// The commands module, which handles the compiler's subcommands, `compile` and `check`.
pub mod commands;
