//! `info` lines: the engine's running report during a search.

use std::fmt;
use std::iter::Peekable;
use std::str::SplitWhitespace;

/// Score in centipawns or mate distance, from the side to move's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    /// Centipawns; 100 is one pawn.
    Cp(i32),
    /// Mate in N moves; negative when the side to move is getting mated.
    Mate(i32),
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Cp(cp) => write!(f, "cp {}", cp),
            Score::Mate(n) => write!(f, "mate {}", n),
        }
    }
}

/// Marks a score that only bounds the true value (a fail-high or fail-low
/// during aspiration search).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBound {
    Lower,
    Upper,
}

/// One `info` line. Fields the engine did not send are `None`/empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineInfo {
    pub depth: Option<u32>,
    pub seldepth: Option<u32>,
    /// Rank of the line when several are searched; 1 is the best.
    pub multipv: Option<u32>,
    pub score: Option<Score>,
    pub bound: Option<ScoreBound>,
    pub nodes: Option<u64>,
    pub nps: Option<u64>,
    /// Milliseconds since the search started.
    pub time: Option<u64>,
    pub hashfull: Option<u32>,
    pub currmove: Option<String>,
    /// Principal variation in coordinate notation.
    pub pv: Vec<String>,
    /// Free text; always the last field on the line.
    pub string: Option<String>,
}

const KEYWORDS: &[&str] = &[
    "depth",
    "seldepth",
    "multipv",
    "score",
    "nodes",
    "nps",
    "time",
    "hashfull",
    "currmove",
    "currmovenumber",
    "tbhits",
    "cpuload",
    "pv",
    "refutation",
    "currline",
    "string",
];

impl EngineInfo {
    pub fn to_uci(&self) -> String {
        let mut out = String::from("info");
        let mut field = |name: &str, value: &dyn fmt::Display| {
            out.push_str(&format!(" {} {}", name, value));
        };

        if let Some(d) = self.depth {
            field("depth", &d);
        }
        if let Some(d) = self.seldepth {
            field("seldepth", &d);
        }
        if let Some(n) = self.multipv {
            field("multipv", &n);
        }
        if let Some(score) = self.score {
            field("score", &score);
        }
        match self.bound {
            Some(ScoreBound::Lower) => out.push_str(" lowerbound"),
            Some(ScoreBound::Upper) => out.push_str(" upperbound"),
            None => {}
        }
        let mut field = |name: &str, value: &dyn fmt::Display| {
            out.push_str(&format!(" {} {}", name, value));
        };
        if let Some(n) = self.nodes {
            field("nodes", &n);
        }
        if let Some(n) = self.nps {
            field("nps", &n);
        }
        if let Some(t) = self.time {
            field("time", &t);
        }
        if let Some(h) = self.hashfull {
            field("hashfull", &h);
        }
        if let Some(m) = &self.currmove {
            field("currmove", m);
        }
        if !self.pv.is_empty() {
            field("pv", &self.pv.join(" "));
        }
        if let Some(s) = &self.string {
            field("string", s);
        }
        out
    }

    /// Parses an `info` line. Unknown fields are skipped along with their
    /// values; malformed numbers leave the field unset.
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace().peekable();
        if tokens.next() != Some("info") {
            return None;
        }

        let mut info = EngineInfo::default();
        while let Some(token) = tokens.next() {
            match token {
                "depth" => info.depth = number(&mut tokens),
                "seldepth" => info.seldepth = number(&mut tokens),
                "multipv" => info.multipv = number(&mut tokens),
                "nodes" => info.nodes = number(&mut tokens),
                "nps" => info.nps = number(&mut tokens),
                "time" => info.time = number(&mut tokens),
                "hashfull" => info.hashfull = number(&mut tokens),
                "currmove" => info.currmove = tokens.next().map(String::from),
                "score" => {
                    info.score = match (tokens.next(), number::<i32>(&mut tokens)) {
                        (Some("cp"), Some(cp)) => Some(Score::Cp(cp)),
                        (Some("mate"), Some(n)) => Some(Score::Mate(n)),
                        _ => None,
                    };
                    info.bound = match tokens.peek() {
                        Some(&"lowerbound") => Some(ScoreBound::Lower),
                        Some(&"upperbound") => Some(ScoreBound::Upper),
                        _ => None,
                    };
                    if info.bound.is_some() {
                        tokens.next();
                    }
                }
                "pv" => {
                    while let Some(mv) = tokens.next_if(|t| !KEYWORDS.contains(t)) {
                        info.pv.push(mv.to_string());
                    }
                }
                "string" => {
                    info.string = Some(tokens.by_ref().collect::<Vec<_>>().join(" "));
                }
                _ => {
                    while tokens.next_if(|t| !KEYWORDS.contains(t)).is_some() {}
                }
            }
        }
        Some(info)
    }
}

fn number<T: std::str::FromStr>(tokens: &mut Peekable<SplitWhitespace<'_>>) -> Option<T> {
    tokens.next().and_then(|t| t.parse().ok())
}

/// Builds `info` lines for an engine to send.
#[derive(Default)]
pub struct InfoBuilder {
    info: EngineInfo,
}

impl InfoBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(mut self, depth: u32) -> Self {
        self.info.depth = Some(depth);
        self.info.seldepth = Some(depth);
        self
    }

    pub fn multipv(mut self, rank: u32) -> Self {
        self.info.multipv = Some(rank);
        self
    }

    pub fn score(mut self, score: Score) -> Self {
        self.info.score = Some(score);
        self
    }

    pub fn nodes(mut self, nodes: u64) -> Self {
        self.info.nodes = Some(nodes);
        self
    }

    pub fn time(mut self, ms: u64) -> Self {
        self.info.time = Some(ms);
        self
    }

    pub fn pv<I, S>(mut self, moves: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.info.pv = moves.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> EngineInfo {
        self.info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_search_line() {
        let line = "info depth 12 seldepth 17 multipv 1 score cp 30 nodes 125000 nps 500000 \
                    hashfull 12 time 250 pv e2e4 e7e5 g1f3";
        let info = EngineInfo::parse(line).unwrap();

        assert_eq!(info.depth, Some(12));
        assert_eq!(info.seldepth, Some(17));
        assert_eq!(info.multipv, Some(1));
        assert_eq!(info.score, Some(Score::Cp(30)));
        assert_eq!(info.bound, None);
        assert_eq!(info.nodes, Some(125000));
        assert_eq!(info.time, Some(250));
        assert_eq!(info.pv, vec!["e2e4", "e7e5", "g1f3"]);
    }

    #[test]
    fn parse_bounded_and_mate_scores() {
        let info = EngineInfo::parse("info depth 20 score cp 41 lowerbound nodes 10").unwrap();
        assert_eq!(info.score, Some(Score::Cp(41)));
        assert_eq!(info.bound, Some(ScoreBound::Lower));
        assert_eq!(info.nodes, Some(10));

        let info = EngineInfo::parse("info depth 9 score mate -3 pv h7h8").unwrap();
        assert_eq!(info.score, Some(Score::Mate(-3)));
    }

    #[test]
    fn unknown_fields_are_skipped() {
        let line = "info depth 5 tbhits 0 cpuload 930 currmovenumber 3 wdl 200 600 200 pv d2d4";
        let info = EngineInfo::parse(line).unwrap();
        assert_eq!(info.depth, Some(5));
        assert_eq!(info.pv, vec!["d2d4"]);
    }

    #[test]
    fn string_takes_the_rest_of_the_line() {
        let line = "info string NNUE evaluation using nn-1.nnue enabled";
        let info = EngineInfo::parse(line).unwrap();
        assert_eq!(
            info.string.as_deref(),
            Some("NNUE evaluation using nn-1.nnue enabled")
        );
        assert!(EngineInfo::parse("bestmove e2e4").is_none());
        assert!(EngineInfo::parse("infodepth 3").is_none());
    }

    #[test]
    fn built_lines_parse_back() {
        let info = InfoBuilder::new()
            .depth(4)
            .multipv(2)
            .score(Score::Mate(2))
            .nodes(4000)
            .pv(["f7f8q", "e8f8"])
            .build();

        let line = info.to_uci();
        assert_eq!(
            line,
            "info depth 4 seldepth 4 multipv 2 score mate 2 nodes 4000 pv f7f8q e8f8"
        );
        assert_eq!(EngineInfo::parse(&line), Some(info));
    }
}
