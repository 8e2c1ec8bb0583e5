mod bits;
mod config;
mod execute;
mod file_loader;
mod instruction;
mod state;
pub mod terminal;
mod trap_vector;

pub use crate::config::Config;

use crate::file_loader::load_image;
use crate::state::State;
use std::error::Error;

/// Loads every image named in `config` (in order, so later images overwrite
/// earlier ones on overlapping addresses) and runs the fetch/decode/execute
/// loop until a HALT trap or a reserved-opcode abort.
pub fn run(config: Config) -> Result<(), Box<dyn Error>> {
    let mut state = State::new();

    for path in &config.images {
        load_image(path, &mut state.memory)
            .map_err(|e| format!("failed to load image: {}: {}", path, e))?;
    }

    while state.running {
        state.step().map_err(|e| format!("fatal: {}", e))?;
    }

    Ok(())
}
