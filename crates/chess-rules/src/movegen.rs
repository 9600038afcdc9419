//! Legal move generation and move application.
//!
//! Moves are generated pseudo-legally by walking the board, then each one is
//! played on a scratch copy of the position and kept only if the mover's
//! king is not left attacked.

use crate::error::MoveError;
use crate::position::{kingside_bit, queenside_bit, Position};
use chess_core::{Color, File, Move, MoveFlag, Piece, Rank, Square};

const KNIGHT_STEPS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

const KING_STEPS: [(i8, i8); 8] = [
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
];

const ROOK_DIRECTIONS: [(i8, i8); 4] = [(0, 1), (1, 0), (0, -1), (-1, 0)];
const BISHOP_DIRECTIONS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, -1), (-1, 1)];

/// Every legal move for the side to move.
///
/// An empty result means checkmate when the side to move is in check and
/// stalemate otherwise.
pub fn legal_moves(position: &Position) -> Vec<Move> {
    let us = position.side_to_move();
    let mut moves = Vec::with_capacity(48);
    generate_pseudo_legal(position, &mut moves);
    moves.retain(|&m| !play(position, m).is_king_attacked(us));
    moves
}

/// Applies a move, returning the successor position.
///
/// Fails with [`MoveError::Illegal`] unless `m` is one of
/// [`legal_moves`]`(position)`, flags included.
pub fn apply_move(position: &Position, m: Move) -> Result<Position, MoveError> {
    if legal_moves(position).contains(&m) {
        Ok(play(position, m))
    } else {
        Err(MoveError::Illegal(m.to_uci()))
    }
}

/// True when the side to move is in check.
pub fn is_check(position: &Position) -> bool {
    position.is_king_attacked(position.side_to_move())
}

/// Plays a move known to be at least pseudo-legal.
pub(crate) fn play(position: &Position, m: Move) -> Position {
    let mut next = *position;
    let us = position.side_to_move();
    let Some((piece, _)) = next.take(m.from()) else {
        return next;
    };
    let captured = next.piece_at(m.to());

    match m.flag() {
        MoveFlag::EnPassant => {
            let file = m.to().file().index() as i8;
            let rank = m.from().rank().index() as i8;
            if let Some(victim) = Square::from_coords(file, rank) {
                next.set(victim, None);
            }
        }
        MoveFlag::CastleKingside | MoveFlag::CastleQueenside => {
            let kingside = m.flag() == MoveFlag::CastleKingside;
            let (rook_from, rook_to) = castle_rook_squares(us, kingside);
            let rook = next.take(rook_from);
            next.set(rook_to, rook);
        }
        _ => {}
    }

    next.set(m.to(), Some((m.promotion_piece().unwrap_or(piece), us)));

    let mut castling = position.castling();
    if piece == Piece::King {
        castling = castling.without_color(us);
    }
    for sq in [m.from(), m.to()] {
        castling = castling.without(rook_home_bits(sq));
    }

    let en_passant = match m.flag() {
        MoveFlag::DoublePush => m.from().offset(0, us.pawn_direction()),
        _ => None,
    };

    let reset_clock = piece == Piece::Pawn || captured.is_some() || m.flag() == MoveFlag::EnPassant;
    next.finish_ply(castling, en_passant, reset_clock);
    next
}

fn castle_rook_squares(color: Color, kingside: bool) -> (Square, Square) {
    let rank = Rank::ALL[color.back_rank() as usize];
    if kingside {
        (Square::new(File::H, rank), Square::new(File::F, rank))
    } else {
        (Square::new(File::A, rank), Square::new(File::D, rank))
    }
}

/// Castling rights lost when a piece leaves or lands on `sq`.
fn rook_home_bits(sq: Square) -> u8 {
    match sq {
        Square::H1 => kingside_bit(Color::White),
        Square::A1 => queenside_bit(Color::White),
        Square::H8 => kingside_bit(Color::Black),
        Square::A8 => queenside_bit(Color::Black),
        _ => 0,
    }
}

/// True if any piece of color `by` attacks `sq`.
pub fn is_square_attacked(position: &Position, sq: Square, by: Color) -> bool {
    let holds = |target: Option<Square>, pieces: &[Piece]| {
        target
            .and_then(|t| position.piece_at(t))
            .is_some_and(|(p, c)| c == by && pieces.contains(&p))
    };

    // A pawn of `by` attacks diagonally forward, so look one rank behind `sq`.
    let back = -by.pawn_direction();
    if holds(sq.offset(-1, back), &[Piece::Pawn]) || holds(sq.offset(1, back), &[Piece::Pawn]) {
        return true;
    }
    if KNIGHT_STEPS
        .iter()
        .any(|&(df, dr)| holds(sq.offset(df, dr), &[Piece::Knight]))
    {
        return true;
    }
    if KING_STEPS
        .iter()
        .any(|&(df, dr)| holds(sq.offset(df, dr), &[Piece::King]))
    {
        return true;
    }

    let slider_hits = |directions: &[(i8, i8)], pieces: &[Piece]| {
        directions.iter().any(|&(df, dr)| {
            let blocker = ray(sq, df, dr).find(|&t| position.piece_at(t).is_some());
            holds(blocker, pieces)
        })
    };
    slider_hits(&ROOK_DIRECTIONS, &[Piece::Rook, Piece::Queen])
        || slider_hits(&BISHOP_DIRECTIONS, &[Piece::Bishop, Piece::Queen])
}

/// Squares from `sq` outward in one direction, excluding `sq`.
fn ray(sq: Square, df: i8, dr: i8) -> impl Iterator<Item = Square> {
    std::iter::successors(sq.offset(df, dr), move |s| s.offset(df, dr))
}

fn generate_pseudo_legal(position: &Position, moves: &mut Vec<Move>) {
    let us = position.side_to_move();
    for (from, piece, color) in position.pieces() {
        if color != us {
            continue;
        }
        match piece {
            Piece::Pawn => pawn_moves(position, from, moves),
            Piece::Knight => step_moves(position, from, &KNIGHT_STEPS, moves),
            Piece::Bishop => slide_moves(position, from, &BISHOP_DIRECTIONS, moves),
            Piece::Rook => slide_moves(position, from, &ROOK_DIRECTIONS, moves),
            Piece::Queen => {
                slide_moves(position, from, &ROOK_DIRECTIONS, moves);
                slide_moves(position, from, &BISHOP_DIRECTIONS, moves);
            }
            Piece::King => {
                step_moves(position, from, &KING_STEPS, moves);
                castling_moves(position, from, moves);
            }
        }
    }
}

fn push_pawn_move(from: Square, to: Square, flag: MoveFlag, promotes: bool, moves: &mut Vec<Move>) {
    if promotes {
        for piece in Piece::PROMOTIONS {
            moves.push(Move::promotion(from, to, piece, flag));
        }
    } else {
        moves.push(Move::new(from, to, flag));
    }
}

fn pawn_moves(position: &Position, from: Square, moves: &mut Vec<Move>) {
    let us = position.side_to_move();
    let dir = us.pawn_direction();
    let start_rank = (us.back_rank() as i8 + dir) as u8;
    let promotes = |to: Square| to.rank().index() == us.promotion_rank();

    if let Some(one) = from.offset(0, dir) {
        if position.piece_at(one).is_none() {
            push_pawn_move(from, one, MoveFlag::Normal, promotes(one), moves);
            if from.rank().index() == start_rank {
                if let Some(two) = one.offset(0, dir) {
                    if position.piece_at(two).is_none() {
                        moves.push(Move::new(from, two, MoveFlag::DoublePush));
                    }
                }
            }
        }
    }

    for df in [-1, 1] {
        let Some(to) = from.offset(df, dir) else {
            continue;
        };
        match position.piece_at(to) {
            Some((_, color)) if color != us => {
                push_pawn_move(from, to, MoveFlag::Capture, promotes(to), moves)
            }
            None if position.en_passant() == Some(to) => {
                moves.push(Move::new(from, to, MoveFlag::EnPassant))
            }
            _ => {}
        }
    }
}

fn step_moves(position: &Position, from: Square, steps: &[(i8, i8)], moves: &mut Vec<Move>) {
    let us = position.side_to_move();
    for &(df, dr) in steps {
        let Some(to) = from.offset(df, dr) else {
            continue;
        };
        match position.piece_at(to) {
            None => moves.push(Move::new(from, to, MoveFlag::Normal)),
            Some((_, color)) if color != us => moves.push(Move::new(from, to, MoveFlag::Capture)),
            Some(_) => {}
        }
    }
}

fn slide_moves(position: &Position, from: Square, directions: &[(i8, i8)], moves: &mut Vec<Move>) {
    let us = position.side_to_move();
    for &(df, dr) in directions {
        for to in ray(from, df, dr) {
            match position.piece_at(to) {
                None => moves.push(Move::new(from, to, MoveFlag::Normal)),
                Some((_, color)) => {
                    if color != us {
                        moves.push(Move::new(from, to, MoveFlag::Capture));
                    }
                    break;
                }
            }
        }
    }
}

fn castling_moves(position: &Position, from: Square, moves: &mut Vec<Move>) {
    let us = position.side_to_move();
    let them = us.opposite();
    let rank = Rank::ALL[us.back_rank() as usize];
    let at = |file: File| Square::new(file, rank);

    if from != at(File::E) || is_square_attacked(position, from, them) {
        return;
    }
    let empty = |files: &[File]| files.iter().all(|&f| position.piece_at(at(f)).is_none());
    let own_rook = |file: File| position.piece_at(at(file)) == Some((Piece::Rook, us));

    // The destination square is covered by the legality filter.
    if position.castling().kingside(us)
        && own_rook(File::H)
        && empty(&[File::F, File::G])
        && !is_square_attacked(position, at(File::F), them)
    {
        moves.push(Move::new(from, at(File::G), MoveFlag::CastleKingside));
    }
    if position.castling().queenside(us)
        && own_rook(File::A)
        && empty(&[File::B, File::C, File::D])
        && !is_square_attacked(position, at(File::D), them)
    {
        moves.push(Move::new(from, at(File::C), MoveFlag::CastleQueenside));
    }
}
