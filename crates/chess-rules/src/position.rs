//! Immutable board position.

use crate::movegen::is_square_attacked;
use crate::zobrist::{self, Fingerprint};
use chess_core::{
    CastlingRights, Color, Fen, FenError, File, Occupant, Piece, Placement, Rank, Square,
};
use std::fmt;

/// A complete chess position.
///
/// Positions are plain values: applying a move produces a new `Position`
/// and never alters the old one.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    board: Placement,
    side_to_move: Color,
    castling: CastlingRights,
    en_passant: Option<Square>,
    halfmove_clock: u32,
    fullmove_number: u32,
}

impl Position {
    /// The standard starting position.
    pub fn startpos() -> Self {
        let mut board: Placement = [[None; 8]; 8];
        let back = [
            Piece::Rook,
            Piece::Knight,
            Piece::Bishop,
            Piece::Queen,
            Piece::King,
            Piece::Bishop,
            Piece::Knight,
            Piece::Rook,
        ];
        for (file, piece) in back.into_iter().enumerate() {
            board[0][file] = Some((piece, Color::White));
            board[1][file] = Some((Piece::Pawn, Color::White));
            board[6][file] = Some((Piece::Pawn, Color::Black));
            board[7][file] = Some((piece, Color::Black));
        }
        Position {
            board,
            side_to_move: Color::White,
            castling: CastlingRights::ALL,
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    /// Parses and validates a FEN string.
    ///
    /// Castling rights whose king or rook has left its home square are
    /// dropped, as is an en passant square with no pawn behind it.
    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let fen = Fen::parse(fen)?;
        let mut position = Position {
            board: fen.placement,
            side_to_move: fen.side_to_move,
            castling: fen.castling,
            en_passant: fen.en_passant,
            halfmove_clock: fen.halfmove_clock,
            fullmove_number: fen.fullmove_number,
        };
        position.validate()?;
        position.castling = position.sanitized_castling();
        position.en_passant = position.sanitized_en_passant();
        Ok(position)
    }

    fn validate(&self) -> Result<(), FenError> {
        for color in [Color::White, Color::Black] {
            let kings = self
                .pieces()
                .filter(|&(_, piece, c)| piece == Piece::King && c == color)
                .count();
            if kings != 1 {
                return Err(FenError::IllegalPosition(format!(
                    "{} has {} kings",
                    color, kings
                )));
            }
        }
        let pawn_on_back_rank = self.pieces().any(|(sq, piece, _)| {
            piece == Piece::Pawn && matches!(sq.rank(), Rank::R1 | Rank::R8)
        });
        if pawn_on_back_rank {
            return Err(FenError::IllegalPosition(
                "pawn on first or last rank".to_string(),
            ));
        }
        let waiting = self.side_to_move.opposite();
        if self.is_king_attacked(waiting) {
            return Err(FenError::IllegalPosition(format!(
                "{} is in check but not to move",
                waiting
            )));
        }
        Ok(())
    }

    fn sanitized_castling(&self) -> CastlingRights {
        let mut rights = self.castling;
        for color in [Color::White, Color::Black] {
            let rank = color.back_rank();
            let home = |file: File| {
                Square::new(file, Rank::ALL[rank as usize])
            };
            if self.piece_at(home(File::E)) != Some((Piece::King, color)) {
                rights = rights.without_color(color);
                continue;
            }
            if self.piece_at(home(File::H)) != Some((Piece::Rook, color)) {
                rights = rights.without(kingside_bit(color));
            }
            if self.piece_at(home(File::A)) != Some((Piece::Rook, color)) {
                rights = rights.without(queenside_bit(color));
            }
        }
        rights
    }

    fn sanitized_en_passant(&self) -> Option<Square> {
        let target = self.en_passant?;
        let mover = self.side_to_move.opposite();
        let expected_rank = match mover {
            Color::White => Rank::R3,
            Color::Black => Rank::R6,
        };
        let pushed = target.offset(0, mover.pawn_direction())?;
        let valid = target.rank() == expected_rank
            && self.piece_at(target).is_none()
            && self.piece_at(pushed) == Some((Piece::Pawn, mover));
        valid.then_some(target)
    }

    /// Serializes the position as FEN.
    pub fn to_fen(&self) -> String {
        Fen {
            placement: self.board,
            side_to_move: self.side_to_move,
            castling: self.castling,
            en_passant: self.en_passant,
            halfmove_clock: self.halfmove_clock,
            fullmove_number: self.fullmove_number,
        }
        .to_string()
    }

    /// Returns the piece and its color on a square, if any.
    #[inline]
    pub fn piece_at(&self, sq: Square) -> Occupant {
        self.board[sq.rank().index() as usize][sq.file().index() as usize]
    }

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    #[inline]
    pub fn castling(&self) -> CastlingRights {
        self.castling
    }

    /// Square a pawn may capture onto en passant, set for one ply after a double push.
    #[inline]
    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    #[inline]
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    #[inline]
    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    /// Every occupied square with its piece.
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece, Color)> + '_ {
        Square::all().filter_map(move |sq| self.piece_at(sq).map(|(p, c)| (sq, p, c)))
    }

    pub fn king_square(&self, color: Color) -> Option<Square> {
        self.pieces()
            .find(|&(_, piece, c)| piece == Piece::King && c == color)
            .map(|(sq, _, _)| sq)
    }

    /// True when `color`'s king is attacked.
    pub fn is_king_attacked(&self, color: Color) -> bool {
        self.king_square(color)
            .is_some_and(|king| is_square_attacked(self, king, color.opposite()))
    }

    /// Identity of this position for repetition and analysis correlation.
    pub fn fingerprint(&self) -> Fingerprint {
        zobrist::fingerprint(self)
    }

    /// Material in pawns for one side.
    pub fn material(&self, color: Color) -> i32 {
        self.pieces()
            .filter(|&(_, _, c)| c == color)
            .map(|(_, piece, _)| piece.value())
            .sum()
    }

    // Mutators used while building the successor position in movegen.

    #[inline]
    pub(crate) fn set(&mut self, sq: Square, occupant: Occupant) {
        self.board[sq.rank().index() as usize][sq.file().index() as usize] = occupant;
    }

    #[inline]
    pub(crate) fn take(&mut self, sq: Square) -> Occupant {
        let occupant = self.piece_at(sq);
        self.set(sq, None);
        occupant
    }

    pub(crate) fn finish_ply(
        &mut self,
        castling: CastlingRights,
        en_passant: Option<Square>,
        reset_clock: bool,
    ) {
        self.castling = castling;
        self.en_passant = en_passant;
        self.halfmove_clock = if reset_clock {
            0
        } else {
            self.halfmove_clock.saturating_add(1)
        };
        if self.side_to_move == Color::Black {
            self.fullmove_number = self.fullmove_number.saturating_add(1);
        }
        self.side_to_move = self.side_to_move.opposite();
    }
}

pub(crate) const fn kingside_bit(color: Color) -> u8 {
    match color {
        Color::White => CastlingRights::WHITE_KINGSIDE,
        Color::Black => CastlingRights::BLACK_KINGSIDE,
    }
}

pub(crate) const fn queenside_bit(color: Color) -> u8 {
    match color {
        Color::White => CastlingRights::WHITE_QUEENSIDE,
        Color::Black => CastlingRights::BLACK_QUEENSIDE,
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::startpos()
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Position({})", self.to_fen())
    }
}

/// Renders the board as text, White at the bottom.
impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rank in Rank::ALL.iter().rev() {
            write!(f, "{} ", rank)?;
            for file in File::ALL {
                let c = match self.piece_at(Square::new(file, *rank)) {
                    Some((piece, color)) => piece.to_fen_char(color),
                    None => '.',
                };
                write!(f, " {}", c)?;
            }
            writeln!(f)?;
        }
        write!(f, "  ")?;
        for file in File::ALL {
            write!(f, " {}", file)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startpos_matches_fen() {
        let parsed = Position::from_fen(Fen::STARTPOS).unwrap();
        assert_eq!(parsed, Position::startpos());
        assert_eq!(parsed.to_fen(), Fen::STARTPOS);
    }

    #[test]
    fn piece_lookup() {
        let pos = Position::startpos();
        assert_eq!(pos.piece_at(Square::E1), Some((Piece::King, Color::White)));
        assert_eq!(pos.piece_at(Square::D8), Some((Piece::Queen, Color::Black)));
        assert_eq!(pos.piece_at(Square::from_algebraic("e4").unwrap()), None);
        assert_eq!(pos.king_square(Color::Black), Some(Square::E8));
    }

    #[test]
    fn rejects_missing_or_extra_kings() {
        assert!(matches!(
            Position::from_fen("8/8/8/8/8/8/8/K7 w - - 0 1"),
            Err(FenError::IllegalPosition(_))
        ));
        assert!(matches!(
            Position::from_fen("k6k/8/8/8/8/8/8/K7 w - - 0 1"),
            Err(FenError::IllegalPosition(_))
        ));
    }

    #[test]
    fn rejects_side_not_to_move_in_check() {
        // Black king on e8 attacked by the rook, but it is White's turn.
        let result = Position::from_fen("4k3/8/8/8/8/8/8/K3R3 w - - 0 1");
        assert!(matches!(result, Err(FenError::IllegalPosition(_))));
    }

    #[test]
    fn rejects_pawns_on_back_rank() {
        let result = Position::from_fen("P3k3/8/8/8/8/8/8/4K3 w - - 0 1");
        assert!(matches!(result, Err(FenError::IllegalPosition(_))));
    }

    #[test]
    fn drops_impossible_castling_rights() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/4K2R w KQkq - 0 1").unwrap();
        assert!(pos.castling().kingside(Color::White));
        assert!(!pos.castling().queenside(Color::White));
        assert!(!pos.castling().kingside(Color::Black));
        assert_eq!(pos.to_fen(), "4k3/8/8/8/8/8/8/4K2R w K - 0 1");
    }

    #[test]
    fn drops_unbacked_en_passant_square() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/4K3 b - e3 0 1").unwrap();
        assert_eq!(pos.en_passant(), None);

        let pos = Position::from_fen("4k3/8/8/8/4P3/8/8/4K3 b - e3 0 1").unwrap();
        assert_eq!(pos.en_passant(), Square::from_algebraic("e3"));
    }

    #[test]
    fn move_counters_saturate() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 b - - 4294967295 4294967295").unwrap();
        let m = crate::parse_algebraic(&pos, "Kd7").unwrap();
        let next = crate::apply_move(&pos, m).unwrap();
        assert_eq!(next.halfmove_clock(), u32::MAX);
        assert_eq!(next.fullmove_number(), u32::MAX);
    }

    #[test]
    fn material_count() {
        let pos = Position::startpos();
        assert_eq!(pos.material(Color::White), 39);
        assert_eq!(pos.material(Color::Black), 39);
    }

    #[test]
    fn board_rendering() {
        let text = Position::startpos().to_string();
        let first = text.lines().next().unwrap();
        assert_eq!(first, "8  r n b q k b n r");
        assert!(text.ends_with("a b c d e f g h"));
    }
}
