//! Text side of the edit pipeline: scene-block parsing, time codecs and the
//! line-oriented edit command grammar. Everything here is pure — the same
//! script text always produces the same blocks and commands.

mod command;
mod error;
mod scene;
pub mod timecode;

pub use command::{parse_commands, CommandKind, EditCommand, ParseError};
pub use error::ScriptError;
pub use scene::{parse_scene_blocks, parse_script_header, BlockId, SceneBlock};
