//! Console commands for driving grids by hand.

use tessera_common::{EntityId, MapError, TileCoord};
use thiserror::Error;

/// Command definition for registration and help output.
#[derive(Debug, Clone)]
pub struct CommandDef {
    /// Command name (what user types)
    pub name: &'static str,
    /// Brief description
    pub description: &'static str,
    /// Usage syntax
    pub usage: &'static str,
    /// Only admin sessions may run it
    pub admin_only: bool,
}

/// Every command the console knows.
pub const COMMANDS: &[CommandDef] = &[
    CommandDef {
        name: "help",
        description: "List commands",
        usage: "help",
        admin_only: false,
    },
    CommandDef {
        name: "splitgrids",
        description: "Turn grid splitting on or off",
        usage: "splitgrids <on|off>",
        admin_only: true,
    },
    CommandDef {
        name: "showgridnodes",
        description: "Toggle the grid node debug feed for this session",
        usage: "showgridnodes",
        admin_only: true,
    },
    CommandDef {
        name: "merge_grids",
        description: "Merge grid B into grid A",
        usage: "merge_grids <gridA> <gridB> <offsetX> <offsetY> [angle]",
        admin_only: true,
    },
    CommandDef {
        name: "listgrids",
        description: "List grids with their tile counts",
        usage: "listgrids",
        admin_only: false,
    },
    CommandDef {
        name: "settile",
        description: "Set one tile; type 0 clears it",
        usage: "settile <grid> <x> <y> <type>",
        admin_only: true,
    },
];

/// Looks up a command definition by name.
#[must_use]
pub fn find_command(name: &str) -> Option<&'static CommandDef> {
    COMMANDS.iter().find(|def| def.name == name)
}

/// Console command failures. Printed to the caller; never fatal.
#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    /// Nothing was typed
    #[error("Empty command")]
    Empty,

    /// Unrecognized command name
    #[error("Unknown command '{0}', try 'help'")]
    Unknown(String),

    /// Wrong number of arguments
    #[error("Usage: {0}")]
    Usage(&'static str),

    /// An argument did not parse
    #[error("Invalid {name} '{value}'")]
    InvalidArgument {
        /// Argument name
        name: &'static str,
        /// Text given
        value: String,
    },

    /// The world rejected the operation
    #[error(transparent)]
    Map(#[from] MapError),
}

/// A parsed console command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `help`
    Help,
    /// `splitgrids <on|off>`
    SplitGrids(bool),
    /// `showgridnodes`
    ShowGridNodes,
    /// `merge_grids`
    MergeGrids {
        /// Grid that receives the tiles
        grid_a: EntityId,
        /// Grid that is merged and deleted
        grid_b: EntityId,
        /// Tile offset applied after rotation
        offset: TileCoord,
        /// Rotation in degrees
        angle: f32,
    },
    /// `listgrids`
    ListGrids,
    /// `settile`
    SetTile {
        /// Target grid
        grid: EntityId,
        /// Tile coordinate
        tile: TileCoord,
        /// Tile type, 0 for empty
        type_id: u16,
    },
}

impl Command {
    /// Name the command was invoked by.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Help => "help",
            Self::SplitGrids(_) => "splitgrids",
            Self::ShowGridNodes => "showgridnodes",
            Self::MergeGrids { .. } => "merge_grids",
            Self::ListGrids => "listgrids",
            Self::SetTile { .. } => "settile",
        }
    }
}

fn parse_arg<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, CommandError> {
    value.parse().map_err(|_| CommandError::InvalidArgument {
        name,
        value: value.to_string(),
    })
}

fn parse_angle(value: &str) -> Result<f32, CommandError> {
    let angle: f32 = parse_arg("angle", value)?;
    if angle.is_finite() {
        Ok(angle)
    } else {
        Err(CommandError::InvalidArgument {
            name: "angle",
            value: value.to_string(),
        })
    }
}

fn parse_grid(value: &str) -> Result<EntityId, CommandError> {
    parse_arg::<u64>("grid", value).map(EntityId::from_raw)
}

/// Parses one console line.
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let mut parts = line.split_whitespace();
    let name = parts.next().ok_or(CommandError::Empty)?;
    let args: Vec<&str> = parts.collect();
    let def = find_command(name).ok_or_else(|| CommandError::Unknown(name.to_string()))?;
    let usage = CommandError::Usage(def.usage);

    match (name, args.as_slice()) {
        ("help", []) => Ok(Command::Help),
        ("splitgrids", [state]) => match *state {
            "on" | "true" | "1" => Ok(Command::SplitGrids(true)),
            "off" | "false" | "0" => Ok(Command::SplitGrids(false)),
            other => Err(CommandError::InvalidArgument {
                name: "state",
                value: other.to_string(),
            }),
        },
        ("showgridnodes", []) => Ok(Command::ShowGridNodes),
        ("merge_grids", [a, b, x, y, rest @ ..]) if rest.len() <= 1 => Ok(Command::MergeGrids {
            grid_a: parse_grid(a)?,
            grid_b: parse_grid(b)?,
            offset: TileCoord::new(parse_arg("offsetX", x)?, parse_arg("offsetY", y)?),
            angle: rest.first().map_or(Ok(0.0), |angle| parse_angle(angle))?,
        }),
        ("listgrids", []) => Ok(Command::ListGrids),
        ("settile", [grid, x, y, type_id]) => Ok(Command::SetTile {
            grid: parse_grid(grid)?,
            tile: TileCoord::new(parse_arg("x", x)?, parse_arg("y", y)?),
            type_id: parse_arg("type", type_id)?,
        }),
        _ => Err(usage),
    }
}

/// Whether only admin sessions may run `command`.
#[must_use]
pub fn requires_admin(command: &Command) -> bool {
    find_command(command.name()).is_some_and(|def| def.admin_only)
}

/// Renders the help listing.
#[must_use]
pub fn help_lines(session_is_admin: bool) -> Vec<String> {
    COMMANDS
        .iter()
        .filter(|def| session_is_admin || !def.admin_only)
        .map(|def| format!("{:<40} {}", def.usage, def.description))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_merge_with_and_without_angle() {
        assert_eq!(
            parse_command("merge_grids 2 3 4 -1"),
            Ok(Command::MergeGrids {
                grid_a: EntityId::from_raw(2),
                grid_b: EntityId::from_raw(3),
                offset: TileCoord::new(4, -1),
                angle: 0.0,
            })
        );
        assert!(matches!(
            parse_command("merge_grids 2 3 4 -1 90"),
            Ok(Command::MergeGrids { angle, .. }) if angle == 90.0
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_command("   "), Err(CommandError::Empty));
        assert_eq!(parse_command("fly"), Err(CommandError::Unknown("fly".to_string())));
        assert_eq!(parse_command("splitgrids"), Err(CommandError::Usage("splitgrids <on|off>")));
        assert_eq!(
            parse_command("settile 1 x 0 1"),
            Err(CommandError::InvalidArgument {
                name: "x",
                value: "x".to_string(),
            })
        );
        assert!(matches!(parse_command("merge_grids 1 2 3 4 5 6"), Err(CommandError::Usage(_))));
        for angle in ["NaN", "inf", "-inf"] {
            assert_eq!(
                parse_command(&format!("merge_grids 1 2 0 0 {angle}")),
                Err(CommandError::InvalidArgument {
                    name: "angle",
                    value: angle.to_string(),
                })
            );
        }
    }

    #[test]
    fn test_admin_flags() {
        assert!(requires_admin(&Command::ShowGridNodes));
        assert!(!requires_admin(&Command::ListGrids));
        assert_eq!(help_lines(false).len(), 2);
    }
}
