//! The board and its pure move resolver.
//!
//! A board is a fixed-size linear track plus a set of short-circuit
//! links (advances and setbacks). [`Board::resolve`] is a pure function
//! of `(position, roll)`: all randomness lives in the session's dice,
//! never here.

use chutes_types::{BoardInfo, LinkInfo, LinkKind};
use serde::{Deserialize, Serialize};

/// A short-circuit link between two squares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Landing on this square triggers the link.
    pub start: u16,
    /// The square the player is carried to.
    pub end: u16,
    /// Advance (forward) or setback (backward).
    pub kind: LinkKind,
}

/// Outcome of resolving a single move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    /// The player's position after the move and any link.
    pub new_position: u16,
    /// The link traversed, if the move landed on one.
    pub link: Option<Link>,
    /// Whether this move reached the final square.
    pub won: bool,
}

/// Errors found by [`Board::validate`].
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    /// Two links share the same start square.
    #[error("duplicate link start at square {0}")]
    DuplicateLinkStart(u16),

    /// A link references a square outside the track.
    #[error("link at {start} targets square {end} beyond board size {size}")]
    LinkOutOfRange {
        /// The offending link's start square.
        start: u16,
        /// The offending link's end square.
        end: u16,
        /// The board size.
        size: u16,
    },

    /// A link starts on the final square or on the start square.
    #[error("link may not start on square {0}")]
    LinkOnTerminalSquare(u16),
}

/// The game board: a linear track with short-circuit links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    /// Number of squares; reaching exactly this square wins.
    pub size: u16,
    /// The short-circuit links, at most one per start square.
    pub links: Vec<Link>,
}

impl Board {
    /// Resolve a move from `position` with the given dice `roll`.
    ///
    /// Overshooting the final square leaves the player in place. Landing
    /// exactly on the final square wins without consulting links.
    /// Otherwise at most one link applies; a link win requires the link
    /// to end on the final square. Links never chain.
    pub fn resolve(&self, position: u16, roll: u8) -> MoveOutcome {
        let target = position.saturating_add(u16::from(roll));

        if target > self.size {
            return MoveOutcome {
                new_position: position,
                link: None,
                won: false,
            };
        }

        if target == self.size {
            return MoveOutcome {
                new_position: target,
                link: None,
                won: true,
            };
        }

        if let Some(link) = self.links.iter().find(|l| l.start == target) {
            return MoveOutcome {
                new_position: link.end,
                link: Some(*link),
                won: link.end == self.size,
            };
        }

        MoveOutcome {
            new_position: target,
            link: None,
            won: false,
        }
    }

    /// The standard 100-square board with ten advances and ten setbacks.
    pub fn default_board() -> Self {
        let advance = |start, end| Link {
            start,
            end,
            kind: LinkKind::Advance,
        };
        let setback = |start, end| Link {
            start,
            end,
            kind: LinkKind::Setback,
        };

        Self {
            size: 100,
            links: vec![
                advance(2, 38),
                advance(7, 14),
                advance(8, 31),
                advance(15, 26),
                advance(21, 42),
                advance(28, 84),
                advance(36, 44),
                advance(51, 67),
                advance(71, 91),
                advance(78, 98),
                setback(16, 6),
                setback(46, 25),
                setback(49, 11),
                setback(62, 19),
                setback(64, 60),
                setback(74, 53),
                setback(89, 68),
                setback(92, 88),
                setback(95, 75),
                setback(99, 80),
            ],
        }
    }

    /// Check the board invariants: unique link starts, every square in
    /// range, no link triggered by the terminal squares.
    ///
    /// The built-in layout upholds these by construction; this check is
    /// for hand-assembled layouts and the tests that build them.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), BoardError> {
        let mut seen = std::collections::HashSet::new();
        for link in &self.links {
            if !seen.insert(link.start) {
                return Err(BoardError::DuplicateLinkStart(link.start));
            }
            if link.start == 0 || link.start >= self.size {
                return Err(BoardError::LinkOnTerminalSquare(link.start));
            }
            if link.end > self.size {
                return Err(BoardError::LinkOutOfRange {
                    start: link.start,
                    end: link.end,
                    size: self.size,
                });
            }
        }
        Ok(())
    }

    /// Project the board into its wire form.
    pub fn to_info(&self) -> BoardInfo {
        BoardInfo {
            size: self.size,
            links: self
                .links
                .iter()
                .map(|l| LinkInfo {
                    start: l.start,
                    end: l.end,
                    kind: l.kind,
                })
                .collect(),
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::default_board()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_move_advances_by_roll() {
        let board = Board::default_board();
        let outcome = board.resolve(10, 3);
        assert_eq!(outcome.new_position, 13);
        assert!(outcome.link.is_none());
        assert!(!outcome.won);
    }

    #[test]
    fn overshoot_stays_put() {
        let board = Board::default_board();
        for roll in 2..=6 {
            let outcome = board.resolve(99, roll);
            assert_eq!(outcome.new_position, 99, "roll {roll} should not move");
            assert!(!outcome.won);
        }
    }

    #[test]
    fn overshoot_by_exactly_one_stays_put() {
        let board = Board {
            size: 20,
            links: Vec::new(),
        };
        let outcome = board.resolve(15, 6);
        assert_eq!(outcome.new_position, 15);
        assert!(!outcome.won);
    }

    #[test]
    fn exact_landing_wins() {
        let board = Board::default_board();
        let outcome = board.resolve(95, 5);
        assert_eq!(outcome.new_position, 100);
        assert!(outcome.won);
        assert!(outcome.link.is_none());
    }

    #[test]
    fn exact_landing_ignores_links() {
        // Square 99 carries a setback, but landing on 100 never
        // consults the link table.
        let board = Board::default_board();
        let outcome = board.resolve(94, 6);
        assert!(outcome.won);
        assert_eq!(outcome.new_position, 100);
    }

    #[test]
    fn advance_link_is_applied() {
        let board = Board::default_board();
        let outcome = board.resolve(0, 2);
        assert_eq!(outcome.new_position, 38);
        let link = outcome.link.unwrap_or(Link {
            start: 0,
            end: 0,
            kind: LinkKind::Advance,
        });
        assert_eq!(link.start, 2);
        assert_eq!(link.end, 38);
        assert_eq!(link.kind, LinkKind::Advance);
        assert!(!outcome.won);
    }

    #[test]
    fn setback_link_is_applied() {
        let board = Board::default_board();
        let outcome = board.resolve(10, 6);
        assert_eq!(outcome.new_position, 6);
        assert!(matches!(
            outcome.link,
            Some(Link {
                kind: LinkKind::Setback,
                ..
            })
        ));
    }

    #[test]
    fn links_do_not_chain() {
        // 46 -> 25 is a setback; square 25 is not itself a link start,
        // but even if it were, resolution applies a single link.
        let board = Board {
            size: 100,
            links: vec![
                Link {
                    start: 5,
                    end: 10,
                    kind: LinkKind::Advance,
                },
                Link {
                    start: 10,
                    end: 50,
                    kind: LinkKind::Advance,
                },
            ],
        };
        let outcome = board.resolve(2, 3);
        assert_eq!(outcome.new_position, 10);
    }

    #[test]
    fn link_ending_on_final_square_wins() {
        let board = Board {
            size: 100,
            links: vec![Link {
                start: 97,
                end: 100,
                kind: LinkKind::Advance,
            }],
        };
        let outcome = board.resolve(95, 2);
        assert_eq!(outcome.new_position, 100);
        assert!(outcome.won);
    }

    #[test]
    fn link_not_ending_on_final_square_does_not_win() {
        let board = Board {
            size: 100,
            links: vec![Link {
                start: 97,
                end: 42,
                kind: LinkKind::Setback,
            }],
        };
        let outcome = board.resolve(95, 2);
        assert_eq!(outcome.new_position, 42);
        assert!(!outcome.won);
    }

    #[test]
    fn resolver_is_deterministic() {
        let board = Board::default_board();
        for position in 0..100 {
            for roll in 1..=6 {
                assert_eq!(
                    board.resolve(position, roll),
                    board.resolve(position, roll)
                );
            }
        }
    }

    #[test]
    fn default_board_is_valid() {
        assert!(Board::default_board().validate().is_ok());
    }

    #[test]
    fn duplicate_link_start_is_rejected() {
        let board = Board {
            size: 100,
            links: vec![
                Link {
                    start: 5,
                    end: 10,
                    kind: LinkKind::Advance,
                },
                Link {
                    start: 5,
                    end: 3,
                    kind: LinkKind::Setback,
                },
            ],
        };
        assert!(matches!(
            board.validate(),
            Err(BoardError::DuplicateLinkStart(5))
        ));
    }

    #[test]
    fn out_of_range_link_is_rejected() {
        let board = Board {
            size: 50,
            links: vec![Link {
                start: 10,
                end: 70,
                kind: LinkKind::Advance,
            }],
        };
        assert!(matches!(
            board.validate(),
            Err(BoardError::LinkOutOfRange { .. })
        ));
    }
}
