//! PGN (Portable Game Notation) export and import.
//!
//! Export writes the Seven Tag Roster, any extra tags, and SAN movetext
//! wrapped at 80 columns. Import replays every move through the rules, so a
//! loaded game is legal by construction; comments, variations, NAGs and
//! move-number tokens are skipped.

use crate::error::PgnError;
use crate::san::parse_move;
use crate::timeline::{is_result_token, GameTimeline};
use crate::Position;
use chess_core::Color;
use chrono::Utc;
use std::path::Path;

const ROSTER: [&str; 7] = ["Event", "Site", "Date", "Round", "White", "Black", "Result"];
const LINE_WIDTH: usize = 80;

/// Ordered PGN tag pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgnTags {
    entries: Vec<(String, String)>,
}

impl PgnTags {
    /// No tags at all.
    pub fn empty() -> Self {
        PgnTags {
            entries: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Sets a tag, replacing an existing value in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Default for PgnTags {
    /// Roster defaults for a game played at home today.
    fn default() -> Self {
        let mut tags = PgnTags::empty();
        tags.set("Event", "Home Game");
        tags.set("Site", "Chess Helper");
        tags.set("Date", Utc::now().format("%Y.%m.%d").to_string());
        tags.set("Round", "1");
        tags.set("White", "?");
        tags.set("Black", "?");
        tags
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

impl GameTimeline {
    /// Serializes the game up to the cursor. The redo buffer is not exported.
    pub fn to_pgn(&self) -> String {
        let mut tags = self.tags().clone();
        tags.set("Result", self.result());
        let start = self.start_position();
        if start != Position::startpos() {
            tags.set("SetUp", "1");
            tags.set("FEN", start.to_fen());
        } else {
            tags.remove("SetUp");
            tags.remove("FEN");
        }

        let mut out = String::new();
        let roster = ROSTER.iter().filter_map(|name| tags.get(name).map(|v| (*name, v)));
        let extra = tags.iter().filter(|(k, _)| !ROSTER.contains(k));
        for (name, value) in roster.chain(extra) {
            out.push_str(&format!("[{} \"{}\"]\n", name, escape(value)));
        }
        out.push('\n');

        let mut tokens = Vec::with_capacity(self.cursor() * 3 / 2 + 1);
        let mut before = start;
        for (i, ply) in self.plies().iter().enumerate() {
            match before.side_to_move() {
                Color::White => tokens.push(format!("{}.", before.fullmove_number())),
                Color::Black if i == 0 => tokens.push(format!("{}...", before.fullmove_number())),
                Color::Black => {}
            }
            tokens.push(ply.san.clone());
            before = ply.position;
        }
        tokens.push(self.result());

        let mut line = String::new();
        for token in tokens {
            if !line.is_empty() && line.len() + 1 + token.len() > LINE_WIDTH {
                out.push_str(&line);
                out.push('\n');
                line.clear();
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&token);
        }
        out.push_str(&line);
        out.push('\n');
        out
    }

    /// Parses the first game in `text`.
    ///
    /// Any malformed token or unplayable move rejects the whole document.
    pub fn from_pgn(text: &str) -> Result<Self, PgnError> {
        let mut reader = PgnReader::new(text);
        let mut tags = PgnTags::empty();
        let mut sans: Vec<(usize, String)> = Vec::new();

        while let Some(token) = reader.next_token()? {
            match token {
                Token::Tag(name, value) => {
                    if !sans.is_empty() {
                        // Tags of the next game.
                        break;
                    }
                    tags.set(name, value);
                }
                Token::Result(result) => {
                    tags.set("Result", result);
                    break;
                }
                Token::Move(offset, san) => sans.push((offset, san)),
            }
        }

        let start = match tags.get("FEN") {
            Some(fen) => Position::from_fen(fen)?,
            None => Position::startpos(),
        };
        let mut timeline = GameTimeline::from_position(start);
        for (ply, (_, san)) in sans.into_iter().enumerate() {
            let m = parse_move(&timeline.current_position(), &san).map_err(|source| {
                PgnError::IllegalMove {
                    ply: ply + 1,
                    token: san.clone(),
                    source,
                }
            })?;
            timeline.play(m).map_err(|source| PgnError::IllegalMove {
                ply: ply + 1,
                token: san.clone(),
                source,
            })?;
        }
        tracing::debug!(plies = timeline.len(), "loaded PGN");
        Ok(timeline.with_tags(tags))
    }

    /// Writes [`to_pgn`](Self::to_pgn) to a file.
    pub fn write_pgn<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        std::fs::write(path, self.to_pgn())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Tag(String, String),
    Move(usize, String),
    Result(String),
}

/// Splits PGN text into tags, SAN moves and the result, dropping everything else.
struct PgnReader<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> PgnReader<'a> {
    fn new(text: &'a str) -> Self {
        PgnReader { text, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn malformed(&self, reason: impl Into<String>) -> PgnError {
        PgnError::Malformed {
            offset: self.pos,
            reason: reason.into(),
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, PgnError> {
        loop {
            let Some(c) = self.peek() else {
                return Ok(None);
            };
            match c {
                c if c.is_whitespace() => {
                    self.bump();
                }
                '[' => return self.read_tag().map(Some),
                '{' => self.skip_comment()?,
                ';' | '%' => self.skip_line(),
                '(' => self.skip_variation()?,
                ')' => return Err(self.malformed("unbalanced ')'")),
                '$' => {
                    self.bump();
                    self.take_while(|c| c.is_ascii_digit());
                }
                _ => {
                    let offset = self.pos;
                    let word = self.take_while(|c| !c.is_whitespace() && !"[]{}();".contains(c));
                    if word.is_empty() {
                        return Err(self.malformed(format!("unexpected '{}'", c)));
                    }
                    if is_result_token(word) {
                        return Ok(Some(Token::Result(word.to_string())));
                    }
                    let san = strip_move_number(word);
                    if !san.is_empty() {
                        return Ok(Some(Token::Move(offset, san.to_string())));
                    }
                }
            }
        }
    }

    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !keep(c) {
                break;
            }
            self.bump();
        }
        &self.text[start..self.pos]
    }

    fn skip_line(&mut self) {
        self.take_while(|c| c != '\n');
    }

    fn skip_comment(&mut self) -> Result<(), PgnError> {
        let start = self.pos;
        self.bump();
        self.take_while(|c| c != '}');
        if self.bump().is_none() {
            self.pos = start;
            return Err(self.malformed("unterminated comment"));
        }
        Ok(())
    }

    fn skip_variation(&mut self) -> Result<(), PgnError> {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(c) = self.peek() {
            match c {
                '(' => {
                    depth += 1;
                    self.bump();
                }
                ')' => {
                    depth -= 1;
                    self.bump();
                    if depth == 0 {
                        return Ok(());
                    }
                }
                '{' => self.skip_comment()?,
                ';' => self.skip_line(),
                _ => {
                    self.bump();
                }
            }
        }
        self.pos = start;
        Err(self.malformed("unterminated variation"))
    }

    fn read_tag(&mut self) -> Result<Token, PgnError> {
        self.bump();
        self.take_while(char::is_whitespace);
        let name = self.take_while(|c| c.is_alphanumeric() || c == '_').to_string();
        if name.is_empty() {
            return Err(self.malformed("tag without a name"));
        }
        self.take_while(char::is_whitespace);
        if self.bump() != Some('"') {
            return Err(self.malformed(format!("tag {} has no quoted value", name)));
        }
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some(escaped) => value.push(escaped),
                    None => break,
                },
                Some('"') => {
                    self.take_while(char::is_whitespace);
                    if self.bump() != Some(']') {
                        return Err(self.malformed(format!("tag {} is not closed", name)));
                    }
                    return Ok(Token::Tag(name, value));
                }
                Some(c) => value.push(c),
                None => break,
            }
        }
        Err(self.malformed(format!("tag {} is not closed", name)))
    }
}

/// Drops a leading "12." or "12..." from a word; "0-0" is left alone.
fn strip_move_number(word: &str) -> &str {
    let digits = word.len() - word.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return word;
    }
    let rest = &word[digits..];
    if rest.starts_with('.') {
        rest.trim_start_matches('.')
    } else {
        word
    }
}
