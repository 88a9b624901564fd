//! A tiny expression language compiled to a stack-machine program, used to
//! optionally override [`crate::record::MineRecord::score`].
//!
//! Lexer → recursive-descent parser → post-order (RPN) instruction stream →
//! allocation-free evaluator (aside from the value stack).

use crate::error::MineError;
use crate::record::MineRecord;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum TokKind {
    End,
    Number,
    Ident,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    Comma,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
    Bang,
}

#[derive(Clone, Debug)]
struct Token<'a> {
    kind: TokKind,
    number: f64,
    text: &'a str,
    pos: usize,
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn next_token(&mut self) -> Token<'a> {
        let bytes = self.src.as_bytes();
        while self.pos < bytes.len() && (bytes[self.pos] as char).is_whitespace() {
            self.pos += 1;
        }

        let start = self.pos;
        if self.pos >= bytes.len() {
            return Token { kind: TokKind::End, number: 0.0, text: "", pos: start };
        }

        let c = bytes[self.pos] as char;

        if c.is_ascii_digit() || c == '.' {
            let mut end = self.pos;
            let mut seen_dot = false;
            let mut seen_digit = false;
            let rest = &self.src[self.pos..];
            let mut chars = rest.char_indices().peekable();
            while let Some(&(i, ch)) = chars.peek() {
                if ch.is_ascii_digit() {
                    seen_digit = true;
                    end = self.pos + i + ch.len_utf8();
                    chars.next();
                } else if ch == '.' && !seen_dot {
                    seen_dot = true;
                    end = self.pos + i + ch.len_utf8();
                    chars.next();
                } else if (ch == 'e' || ch == 'E')
                    && seen_digit
                    && matches!(
                        rest[i + ch.len_utf8()..].chars().next(),
                        Some(d) if d.is_ascii_digit() || d == '+' || d == '-'
                    )
                {
                    end = self.pos + i + ch.len_utf8();
                    chars.next();
                    if let Some(&(j, sign)) = chars.peek() {
                        if sign == '+' || sign == '-' {
                            end = self.pos + j + sign.len_utf8();
                            chars.next();
                        }
                    }
                } else {
                    break;
                }
            }
            let text = &self.src[start..end];
            if let Ok(number) = text.parse::<f64>() {
                self.pos = end;
                return Token { kind: TokKind::Number, number, text, pos: start };
            }
        }

        if c.is_alphabetic() || c == '_' {
            let mut end = self.pos;
            for (i, ch) in self.src[self.pos..].char_indices() {
                if ch.is_alphanumeric() || ch == '_' {
                    end = self.pos + i + ch.len_utf8();
                } else {
                    break;
                }
            }
            let text = &self.src[start..end];
            self.pos = end;
            return Token { kind: TokKind::Ident, number: 0.0, text, pos: start };
        }

        if self.pos + 1 < bytes.len() {
            let n = bytes[self.pos + 1] as char;
            let two = match (c, n) {
                ('<', '=') => Some(TokKind::LessEq),
                ('>', '=') => Some(TokKind::GreaterEq),
                ('=', '=') => Some(TokKind::EqEq),
                ('!', '=') => Some(TokKind::NotEq),
                ('&', '&') => Some(TokKind::AndAnd),
                ('|', '|') => Some(TokKind::OrOr),
                _ => None,
            };
            if let Some(kind) = two {
                self.pos += 2;
                return Token { kind, number: 0.0, text: &self.src[start..start + 2], pos: start };
            }
        }

        let kind = match c {
            '+' => TokKind::Plus,
            '-' => TokKind::Minus,
            '*' => TokKind::Star,
            '/' => TokKind::Slash,
            '^' => TokKind::Caret,
            '(' => TokKind::LParen,
            ')' => TokKind::RParen,
            ',' => TokKind::Comma,
            '<' => TokKind::Less,
            '>' => TokKind::Greater,
            '!' => TokKind::Bang,
            _ => TokKind::End,
        };
        self.pos += c.len_utf8();
        Token { kind, number: 0.0, text: &self.src[start..self.pos], pos: start }
    }
}

#[derive(Clone, Copy, Debug)]
enum Instr {
    PushConst(f64),
    PushVar(Var),
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Neg,
    Not,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Eq,
    NotEq,
    And,
    Or,
    Min,
    Max,
    Clamp,
    Abs,
    Sqrt,
    Log,
    Exp,
    Floor,
    Ceil,
    Round,
    Lerp,
    Step,
    Smoothstep,
}

#[derive(Clone, Copy, Debug)]
enum Var {
    Seed,
    W,
    H,
    Area,
    Day,
    PopDensity,
    RoadDensity,
    ZoneDensity,
    Population,
    Happiness,
    Money,
    AvgLandValue,
    TrafficCongestion,
    GoodsSatisfaction,
    ServicesOverallSatisfaction,
    WaterTiles,
    RoadTiles,
    ResTiles,
    ComTiles,
    IndTiles,
    ParkTiles,
    WaterFrac,
    RoadFrac,
    ZoneFrac,
    ParkFrac,
    SeaFloodFrac,
    SeaMaxDepth,
    PondFrac,
    PondMaxDepth,
    PondVolume,
    FloodRisk,
    Score,
    ObjectiveScore,
    Pi,
    E,
}

fn normalize_ident(s: &str) -> String {
    s.chars()
        .map(|c| {
            let lower = c.to_ascii_lowercase();
            if lower == '-' || lower == ' ' || lower == '.' { '_' } else { lower }
        })
        .collect()
}

fn lookup_var(ident: &str) -> Option<Var> {
    let k = normalize_ident(ident);
    Some(match k.as_str() {
        "seed" => Var::Seed,
        "w" | "width" => Var::W,
        "h" | "height" => Var::H,
        "area" => Var::Area,
        "day" => Var::Day,
        "pop_density" | "population_density" => Var::PopDensity,
        "road_density" => Var::RoadDensity,
        "zone_density" => Var::ZoneDensity,
        "population" | "pop" => Var::Population,
        "happiness" => Var::Happiness,
        "money" => Var::Money,
        "avg_land_value" | "avglandvalue" | "land_value" => Var::AvgLandValue,
        "traffic_congestion" | "traffic" | "congestion" => Var::TrafficCongestion,
        "goods_satisfaction" | "goods" => Var::GoodsSatisfaction,
        "services_overall_satisfaction" | "services_satisfaction" | "services" => {
            Var::ServicesOverallSatisfaction
        }
        "water_tiles" => Var::WaterTiles,
        "road_tiles" => Var::RoadTiles,
        "res_tiles" | "residential_tiles" => Var::ResTiles,
        "com_tiles" | "commercial_tiles" => Var::ComTiles,
        "ind_tiles" | "industrial_tiles" => Var::IndTiles,
        "park_tiles" => Var::ParkTiles,
        "water_frac" | "water_fraction" => Var::WaterFrac,
        "road_frac" | "road_fraction" => Var::RoadFrac,
        "zone_frac" | "zone_fraction" => Var::ZoneFrac,
        "park_frac" | "park_fraction" => Var::ParkFrac,
        "sea_flood_frac" => Var::SeaFloodFrac,
        "sea_max_depth" => Var::SeaMaxDepth,
        "pond_frac" => Var::PondFrac,
        "pond_max_depth" => Var::PondMaxDepth,
        "pond_volume" => Var::PondVolume,
        "flood_risk" => Var::FloodRisk,
        "score" => Var::Score,
        "objective_score" | "objective" => Var::ObjectiveScore,
        "pi" => Var::Pi,
        "e" => Var::E,
        _ => return None,
    })
}

fn var_value(var: Var, r: &MineRecord) -> f64 {
    match var {
        Var::Seed => r.seed as f64,
        Var::W => f64::from(r.w),
        Var::H => f64::from(r.h),
        Var::Area => r.area(),
        Var::Day => f64::from(r.stats.day),
        Var::PopDensity => r.pop_density(),
        Var::RoadDensity => r.road_density(),
        Var::ZoneDensity => r.zone_frac,
        Var::Population => f64::from(r.stats.population),
        Var::Happiness => f64::from(r.stats.happiness),
        Var::Money => r.stats.money,
        Var::AvgLandValue => f64::from(r.stats.avg_land_value),
        Var::TrafficCongestion => f64::from(r.stats.traffic_congestion),
        Var::GoodsSatisfaction => f64::from(r.stats.goods_satisfaction),
        Var::ServicesOverallSatisfaction => f64::from(r.stats.services_overall_satisfaction),
        Var::WaterTiles => f64::from(r.water_tiles),
        Var::RoadTiles => f64::from(r.road_tiles),
        Var::ResTiles => f64::from(r.res_tiles),
        Var::ComTiles => f64::from(r.com_tiles),
        Var::IndTiles => f64::from(r.ind_tiles),
        Var::ParkTiles => f64::from(r.park_tiles),
        Var::WaterFrac => r.water_frac,
        Var::RoadFrac => r.road_frac,
        Var::ZoneFrac => r.zone_frac,
        Var::ParkFrac => r.park_frac,
        Var::SeaFloodFrac => r.sea_flood_frac,
        Var::SeaMaxDepth => r.sea_max_depth,
        Var::PondFrac => r.pond_frac,
        Var::PondMaxDepth => r.pond_max_depth,
        Var::PondVolume => r.pond_volume,
        Var::FloodRisk => r.flood_risk(),
        Var::Score => r.score,
        Var::ObjectiveScore => r.objective_score,
        Var::Pi => std::f64::consts::PI,
        Var::E => std::f64::consts::E,
    }
}

fn format_error(src: &str, pos: usize, msg: &str) -> MineError {
    let a = pos.saturating_sub(32);
    let b = (pos + 32).min(src.len());
    let snippet = if src.is_empty() {
        String::new()
    } else {
        let caret = " ".repeat(pos.saturating_sub(a));
        format!("  {}\n  {}^", &src[a..b], caret)
    };
    MineError::ExprCompileFailure {
        offset: pos,
        message: msg.to_owned(),
        pointer: snippet,
    }
}

struct Parser<'a> {
    src: &'a str,
    lexer: Lexer<'a>,
    tok: Token<'a>,
    code: Vec<Instr>,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        let mut lexer = Lexer::new(src);
        let tok = lexer.next_token();
        Self { src, lexer, tok, code: Vec::new() }
    }

    fn bump(&mut self) {
        self.tok = self.lexer.next_token();
    }

    fn accept(&mut self, kind: TokKind) -> bool {
        if self.tok.kind == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokKind, what: &str) -> Result<(), MineError> {
        if self.tok.kind == kind {
            self.bump();
            Ok(())
        } else {
            Err(format_error(self.src, self.tok.pos, &format!("expected {what}")))
        }
    }

    fn parse(mut self) -> Result<Vec<Instr>, MineError> {
        self.parse_or()?;
        if self.tok.kind != TokKind::End {
            return Err(format_error(self.src, self.tok.pos, "unexpected token"));
        }
        if self.code.is_empty() {
            return Err(format_error(self.src, 0, "empty expression"));
        }
        Ok(self.code)
    }

    fn parse_or(&mut self) -> Result<(), MineError> {
        self.parse_and()?;
        while self.tok.kind == TokKind::OrOr {
            self.bump();
            self.parse_and()?;
            self.code.push(Instr::Or);
        }
        Ok(())
    }

    fn parse_and(&mut self) -> Result<(), MineError> {
        self.parse_equality()?;
        while self.tok.kind == TokKind::AndAnd {
            self.bump();
            self.parse_equality()?;
            self.code.push(Instr::And);
        }
        Ok(())
    }

    fn parse_equality(&mut self) -> Result<(), MineError> {
        self.parse_relational()?;
        loop {
            let op = match self.tok.kind {
                TokKind::EqEq => Instr::Eq,
                TokKind::NotEq => Instr::NotEq,
                _ => break,
            };
            self.bump();
            self.parse_relational()?;
            self.code.push(op);
        }
        Ok(())
    }

    fn parse_relational(&mut self) -> Result<(), MineError> {
        self.parse_add()?;
        loop {
            let op = match self.tok.kind {
                TokKind::Less => Instr::Less,
                TokKind::LessEq => Instr::LessEq,
                TokKind::Greater => Instr::Greater,
                TokKind::GreaterEq => Instr::GreaterEq,
                _ => break,
            };
            self.bump();
            self.parse_add()?;
            self.code.push(op);
        }
        Ok(())
    }

    fn parse_add(&mut self) -> Result<(), MineError> {
        self.parse_mul()?;
        loop {
            let op = match self.tok.kind {
                TokKind::Plus => Instr::Add,
                TokKind::Minus => Instr::Sub,
                _ => break,
            };
            self.bump();
            self.parse_mul()?;
            self.code.push(op);
        }
        Ok(())
    }

    fn parse_mul(&mut self) -> Result<(), MineError> {
        self.parse_pow()?;
        loop {
            let op = match self.tok.kind {
                TokKind::Star => Instr::Mul,
                TokKind::Slash => Instr::Div,
                _ => break,
            };
            self.bump();
            self.parse_pow()?;
            self.code.push(op);
        }
        Ok(())
    }

    fn parse_pow(&mut self) -> Result<(), MineError> {
        self.parse_unary()?;
        if self.tok.kind == TokKind::Caret {
            self.bump();
            self.parse_pow()?;
            self.code.push(Instr::Pow);
        }
        Ok(())
    }

    fn parse_unary(&mut self) -> Result<(), MineError> {
        match self.tok.kind {
            TokKind::Plus => {
                self.bump();
                self.parse_unary()
            }
            TokKind::Minus => {
                self.bump();
                self.parse_unary()?;
                self.code.push(Instr::Neg);
                Ok(())
            }
            TokKind::Bang => {
                self.bump();
                self.parse_unary()?;
                self.code.push(Instr::Not);
                Ok(())
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<(), MineError> {
        let tok = self.tok.clone();

        if tok.kind == TokKind::Number {
            self.code.push(Instr::PushConst(tok.number));
            self.bump();
            return Ok(());
        }

        if tok.kind == TokKind::Ident {
            let ident = tok.text;
            self.bump();

            if self.accept(TokKind::LParen) {
                let mut argc = 0usize;
                if !self.accept(TokKind::RParen) {
                    loop {
                        self.parse_or()?;
                        argc += 1;
                        if self.accept(TokKind::Comma) {
                            continue;
                        }
                        self.expect(TokKind::RParen, "')'")?;
                        break;
                    }
                }

                let fname = normalize_ident(ident);
                let check = |want: usize| -> Result<(), MineError> {
                    if argc == want {
                        Ok(())
                    } else {
                        Err(format_error(
                            self.src,
                            tok.pos,
                            &format!("function '{ident}' expects {want} args"),
                        ))
                    }
                };

                match fname.as_str() {
                    "abs" => { check(1)?; self.code.push(Instr::Abs); }
                    "sqrt" => { check(1)?; self.code.push(Instr::Sqrt); }
                    "log" => { check(1)?; self.code.push(Instr::Log); }
                    "exp" => { check(1)?; self.code.push(Instr::Exp); }
                    "floor" => { check(1)?; self.code.push(Instr::Floor); }
                    "ceil" | "ceiling" => { check(1)?; self.code.push(Instr::Ceil); }
                    "round" => { check(1)?; self.code.push(Instr::Round); }
                    "min" => { check(2)?; self.code.push(Instr::Min); }
                    "max" => { check(2)?; self.code.push(Instr::Max); }
                    "pow" => { check(2)?; self.code.push(Instr::Pow); }
                    "step" => { check(2)?; self.code.push(Instr::Step); }
                    "clamp" => { check(3)?; self.code.push(Instr::Clamp); }
                    "lerp" => { check(3)?; self.code.push(Instr::Lerp); }
                    "smoothstep" => { check(3)?; self.code.push(Instr::Smoothstep); }
                    _ => {
                        return Err(format_error(
                            self.src,
                            tok.pos,
                            &format!("unknown function: {ident}"),
                        ));
                    }
                }
                return Ok(());
            }

            let Some(var) = lookup_var(ident) else {
                return Err(format_error(self.src, tok.pos, &format!("unknown variable: {ident}")));
            };
            self.code.push(Instr::PushVar(var));
            return Ok(());
        }

        if self.accept(TokKind::LParen) {
            self.parse_or()?;
            self.expect(TokKind::RParen, "')'")?;
            return Ok(());
        }

        Err(format_error(self.src, tok.pos, "expected number, variable, or '(' expression ')'"))
    }
}

fn smoothstep(e0: f64, e1: f64, x: f64) -> f64 {
    if e0 == e1 {
        return if x < e0 { 0.0 } else { 1.0 };
    }
    let t = ((x - e0) / (e1 - e0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// A compiled score-expression program.
#[derive(Clone, Debug)]
pub struct Program {
    code: Vec<Instr>,
}

impl Program {
    /// Compiles `source` into a program.
    ///
    /// # Errors
    /// Returns [`MineError::ExprCompileFailure`] with the byte offset and an
    /// arrow-pointing rendering of the failing token.
    pub fn compile(source: &str) -> Result<Self, MineError> {
        let code = Parser::new(source).parse()?;
        Ok(Self { code })
    }

    /// Evaluates the program against `record`.
    ///
    /// Returns `None` on stack underflow or when the final stack depth isn't
    /// exactly one; callers degrade that to a sentinel score.
    #[must_use]
    pub fn eval(&self, record: &MineRecord) -> Option<f64> {
        let mut stack: Vec<f64> = Vec::with_capacity(self.code.len());

        macro_rules! pop1 {
            () => {
                stack.pop()?
            };
        }
        macro_rules! pop2 {
            () => {{
                let b = stack.pop()?;
                let a = stack.pop()?;
                (a, b)
            }};
        }
        macro_rules! pop3 {
            () => {{
                let c = stack.pop()?;
                let b = stack.pop()?;
                let a = stack.pop()?;
                (a, b, c)
            }};
        }

        for instr in &self.code {
            match *instr {
                Instr::PushConst(v) => stack.push(v),
                Instr::PushVar(var) => stack.push(var_value(var, record)),
                Instr::Add => { let (a, b) = pop2!(); stack.push(a + b); }
                Instr::Sub => { let (a, b) = pop2!(); stack.push(a - b); }
                Instr::Mul => { let (a, b) = pop2!(); stack.push(a * b); }
                Instr::Div => { let (a, b) = pop2!(); stack.push(a / b); }
                Instr::Pow => { let (a, b) = pop2!(); stack.push(a.powf(b)); }
                Instr::Neg => { let a = pop1!(); stack.push(-a); }
                Instr::Not => { let a = pop1!(); stack.push(if a == 0.0 { 1.0 } else { 0.0 }); }
                Instr::Less => { let (a, b) = pop2!(); stack.push(f64::from(u8::from(a < b))); }
                Instr::LessEq => { let (a, b) = pop2!(); stack.push(f64::from(u8::from(a <= b))); }
                Instr::Greater => { let (a, b) = pop2!(); stack.push(f64::from(u8::from(a > b))); }
                Instr::GreaterEq => { let (a, b) = pop2!(); stack.push(f64::from(u8::from(a >= b))); }
                Instr::Eq => { let (a, b) = pop2!(); stack.push(f64::from(u8::from(a == b))); }
                Instr::NotEq => { let (a, b) = pop2!(); stack.push(f64::from(u8::from(a != b))); }
                Instr::And => { let (a, b) = pop2!(); stack.push(f64::from(u8::from(a != 0.0 && b != 0.0))); }
                Instr::Or => { let (a, b) = pop2!(); stack.push(f64::from(u8::from(a != 0.0 || b != 0.0))); }
                Instr::Min => { let (a, b) = pop2!(); stack.push(a.min(b)); }
                Instr::Max => { let (a, b) = pop2!(); stack.push(a.max(b)); }
                Instr::Clamp => { let (x, lo, hi) = pop3!(); stack.push(x.clamp(lo, hi)); }
                Instr::Abs => { let a = pop1!(); stack.push(a.abs()); }
                Instr::Sqrt => { let a = pop1!(); stack.push(a.sqrt()); }
                Instr::Log => { let a = pop1!(); stack.push(a.ln()); }
                Instr::Exp => { let a = pop1!(); stack.push(a.exp()); }
                Instr::Floor => { let a = pop1!(); stack.push(a.floor()); }
                Instr::Ceil => { let a = pop1!(); stack.push(a.ceil()); }
                Instr::Round => { let a = pop1!(); stack.push(a.round()); }
                Instr::Lerp => { let (a, b, t) = pop3!(); stack.push(a + (b - a) * t); }
                Instr::Step => { let (edge, x) = pop2!(); stack.push(f64::from(u8::from(x >= edge))); }
                Instr::Smoothstep => { let (e0, e1, x) = pop3!(); stack.push(smoothstep(e0, e1, x)); }
            }
        }

        if stack.len() == 1 { stack.pop() } else { None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> MineRecord {
        let mut r = MineRecord::default();
        r.w = 10;
        r.h = 10;
        r.stats.population = 500;
        r.stats.happiness = 0.5;
        r
    }

    #[test]
    fn compiles_and_evaluates_arithmetic() {
        let program = Program::compile("1 + 2 * 3").unwrap();
        assert_eq!(program.eval(&record()), Some(7.0));
    }

    #[test]
    fn pow_is_right_associative() {
        let program = Program::compile("2 ^ 3 ^ 2").unwrap();
        assert_eq!(program.eval(&record()), Some(2f64.powf(9.0)));
    }

    #[test]
    fn variables_resolve_case_insensitively() {
        let program = Program::compile("POPULATION + Area").unwrap();
        assert_eq!(program.eval(&record()), Some(500.0 + 100.0));
    }

    #[test]
    fn functions_dispatch_by_arity() {
        let program = Program::compile("clamp(pop_density * 1000, 0, 1)").unwrap();
        assert!(program.eval(&record()).is_some());
    }

    #[test]
    fn unknown_function_fails_to_compile() {
        let err = Program::compile("wobble(1)").unwrap_err();
        assert!(matches!(err, MineError::ExprCompileFailure { .. }));
    }

    #[test]
    fn unknown_variable_fails_to_compile() {
        assert!(Program::compile("not_a_var").is_err());
    }

    #[test]
    fn empty_expression_fails_to_compile() {
        assert!(Program::compile("   ").is_err());
    }

    #[test]
    fn boolean_operators_short_circuit_to_zero_or_one() {
        let program = Program::compile("(1 < 2) && (3 > 4)").unwrap();
        assert_eq!(program.eval(&record()), Some(0.0));
    }

    #[test]
    fn comparison_chain_and_logic_work_together() {
        let program = Program::compile("score == 0 || objective_score == 0").unwrap();
        assert_eq!(program.eval(&record()), Some(1.0));
    }
}
