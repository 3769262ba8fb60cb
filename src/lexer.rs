use self::Token::*;
use crate::error::ParseError;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    And,
    Apostrophe,
    Assign,
    Asterisk,
    AsteriskAssign,
    Break,
    Colon,
    Comma,
    Continue,
    DotAsterisk,
    DotMinus,
    DotPercent,
    DotPlus,
    DotSlash,
    Else,
    EndOfFile,
    Equal,
    False,
    Float(f64),
    For,
    Function,
    GreaterEqual,
    GreaterThan,
    Identifier(String),
    If,
    In,
    Integer(i32),
    LeftBrace,
    LeftBracket,
    LeftParentheses,
    LessEqual,
    LessThan,
    Minus,
    MinusAssign,
    Not,
    NotEqual,
    Or,
    Percent,
    PercentAssign,
    Plus,
    PlusAssign,
    Print,
    Return,
    RightBrace,
    RightBracket,
    RightParentheses,
    Semicolon,
    Slash,
    SlashAssign,
    Str(String),
    True,
    While,
    Xor,
}

pub const EOF_CHAR: char = '\0';

pub struct Lexer<'a> {
    chars: Chars<'a>,
    line: u32,
}

/// Tokenizes an entire source text into `(token, line)` pairs, without the
/// trailing end-of-file marker.
pub fn tokenize(input: &str) -> Result<Vec<(Token, u32)>, ParseError> {
    Lexer::new(input).exhaust()
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Lexer<'a> {
        Self {
            chars: input.chars(),
            line: 1,
        }
    }

    pub fn next_token(&mut self) -> Result<(Token, u32), ParseError> {
        self.skip_trivia();
        let line = self.line;
        let first_char = self.read_char();
        let token = match first_char {
            '=' => self.next_char_or(Assign, '=', Equal),
            '+' => self.next_char_or(Plus, '=', PlusAssign),
            '-' => self.next_char_or(Minus, '=', MinusAssign),
            '*' => self.next_char_or(Asterisk, '=', AsteriskAssign),
            '/' => self.next_char_or(Slash, '=', SlashAssign),
            '%' => self.next_char_or(Percent, '=', PercentAssign),
            '<' => self.next_char_or(LessThan, '=', LessEqual),
            '>' => self.next_char_or(GreaterThan, '=', GreaterEqual),
            '!' => match self.peek_nth(0) {
                '=' => {
                    self.read_char();
                    NotEqual
                }
                _ => return Err(ParseError::IllegalCharacter { character: '!', line }),
            },
            '.' => match self.read_char() {
                '+' => DotPlus,
                '-' => DotMinus,
                '*' => DotAsterisk,
                '/' => DotSlash,
                '%' => DotPercent,
                _ => return Err(ParseError::IllegalCharacter { character: '.', line }),
            },
            ':' => Colon,
            '\'' => Apostrophe,
            ',' => Comma,
            ';' => Semicolon,
            '(' => LeftParentheses,
            ')' => RightParentheses,
            '[' => LeftBracket,
            ']' => RightBracket,
            '{' => LeftBrace,
            '}' => RightBrace,
            '"' => self.read_string(line)?,
            EOF_CHAR => EndOfFile,
            c if Self::is_letter(c) => {
                let mut identifier = c.to_string();
                identifier.push_str(&self.take_while(Self::is_letter_or_digit));
                Self::lookup_identifier(&identifier)
            }
            c if Self::is_digit(c) => self.read_number(c, line)?,
            illegal => {
                return Err(ParseError::IllegalCharacter {
                    character: illegal,
                    line,
                })
            }
        };
        Ok((token, line))
    }

    pub fn exhaust(&mut self) -> Result<Vec<(Token, u32)>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let (next_token, line) = self.next_token()?;
            if let Token::EndOfFile = next_token {
                break;
            }
            tokens.push((next_token, line));
        }
        Ok(tokens)
    }

    fn read_number(&mut self, first: char, line: u32) -> Result<Token, ParseError> {
        let mut number = first.to_string();
        number.push_str(&self.take_while(Self::is_digit));
        // A dot turns the literal into a float only when a digit follows,
        // so `1.+2` still lexes as `1 .+ 2`.
        if self.peek_nth(0) == '.' && Self::is_digit(self.peek_nth(1)) {
            number.push(self.read_char());
            number.push_str(&self.take_while(Self::is_digit));
            let value = number
                .parse::<f64>()
                .map_err(|_| ParseError::InvalidNumber {
                    literal: number.clone(),
                    line,
                })?;
            Ok(Float(value))
        } else {
            let value = number
                .parse::<i32>()
                .map_err(|_| ParseError::InvalidNumber {
                    literal: number.clone(),
                    line,
                })?;
            Ok(Integer(value))
        }
    }

    fn read_string(&mut self, line: u32) -> Result<Token, ParseError> {
        let mut contents = String::new();
        loop {
            match self.read_char() {
                '"' => return Ok(Str(contents)),
                EOF_CHAR | '\n' => return Err(ParseError::UnterminatedString { line }),
                c => contents.push(c),
            }
        }
    }

    fn read_char(&mut self) -> char {
        let c = self.chars.next().unwrap_or(EOF_CHAR);
        if c == '\n' {
            self.line += 1;
        }
        c
    }

    fn peek_nth(&self, n: usize) -> char {
        self.chars.clone().nth(n).unwrap_or(EOF_CHAR)
    }

    fn is_eof(&self) -> bool {
        self.chars.as_str().is_empty()
    }

    fn take_while(&mut self, mut predicate: impl FnMut(char) -> bool) -> String {
        let mut chars = String::new();
        while predicate(self.peek_nth(0)) && !self.is_eof() {
            chars.push(self.read_char());
        }
        chars
    }

    fn skip_trivia(&mut self) {
        loop {
            while Self::is_whitespace(self.peek_nth(0)) && !self.is_eof() {
                self.read_char();
            }
            if self.peek_nth(0) == '#' {
                while self.peek_nth(0) != '\n' && !self.is_eof() {
                    self.read_char();
                }
            } else {
                break;
            }
        }
    }

    fn is_letter(c: char) -> bool {
        ('a'..='z').contains(&c) || ('A'..='Z').contains(&c) || c == '_'
    }

    fn is_digit(c: char) -> bool {
        ('0'..='9').contains(&c)
    }

    fn is_letter_or_digit(c: char) -> bool {
        Self::is_letter(c) || Self::is_digit(c)
    }

    fn is_whitespace(c: char) -> bool {
        c == ' ' || c == '\t' || c == '\n' || c == '\r'
    }

    fn lookup_identifier(identifier: &str) -> Token {
        match identifier {
            "if" => If,
            "else" => Else,
            "while" => While,
            "for" => For,
            "in" => In,
            "function" => Function,
            "return" => Return,
            "break" => Break,
            "continue" => Continue,
            "print" => Print,
            "and" => And,
            "or" => Or,
            "xor" => Xor,
            "not" => Not,
            "true" => True,
            "false" => False,
            _ => Identifier(identifier.to_string()),
        }
    }

    fn next_char_or(&mut self, default: Token, next_char: char, token: Token) -> Token {
        match self.peek_nth(0) {
            c if c == next_char => {
                self.read_char();
                token
            }
            _ => default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_token() -> Result<(), ParseError> {
        let input = r#"a = 1;
b = a .+ [1, 2.5];
# a comment
if a <= 2 { print "ok" * 3; }
m = v';
r = 1:10;
"#;

        let tokens = [
            // a = 1;
            (Token::Identifier("a".to_string()), 1),
            (Token::Assign, 1),
            (Token::Integer(1), 1),
            (Token::Semicolon, 1),
            // b = a .+ [1, 2.5];
            (Token::Identifier("b".to_string()), 2),
            (Token::Assign, 2),
            (Token::Identifier("a".to_string()), 2),
            (Token::DotPlus, 2),
            (Token::LeftBracket, 2),
            (Token::Integer(1), 2),
            (Token::Comma, 2),
            (Token::Float(2.5), 2),
            (Token::RightBracket, 2),
            (Token::Semicolon, 2),
            // if a <= 2 { print "ok" * 3; }
            (Token::If, 4),
            (Token::Identifier("a".to_string()), 4),
            (Token::LessEqual, 4),
            (Token::Integer(2), 4),
            (Token::LeftBrace, 4),
            (Token::Print, 4),
            (Token::Str("ok".to_string()), 4),
            (Token::Asterisk, 4),
            (Token::Integer(3), 4),
            (Token::Semicolon, 4),
            (Token::RightBrace, 4),
            // m = v';
            (Token::Identifier("m".to_string()), 5),
            (Token::Assign, 5),
            (Token::Identifier("v".to_string()), 5),
            (Token::Apostrophe, 5),
            (Token::Semicolon, 5),
            // r = 1:10;
            (Token::Identifier("r".to_string()), 6),
            (Token::Assign, 6),
            (Token::Integer(1), 6),
            (Token::Colon, 6),
            (Token::Integer(10), 6),
            (Token::Semicolon, 6),
        ];

        let mut lexer = Lexer::new(input);

        for token in tokens.iter() {
            assert_eq!(lexer.next_token()?, *token);
        }
        assert_eq!(lexer.next_token()?.0, Token::EndOfFile);

        Ok(())
    }

    #[test]
    fn compound_operators() -> Result<(), ParseError> {
        let tokens = tokenize("a += 1; a %= 2; a == b; a != b;")?;
        let kinds: Vec<Token> = tokens.into_iter().map(|(token, _)| token).collect();
        assert_eq!(
            kinds,
            vec![
                Token::Identifier("a".to_string()),
                Token::PlusAssign,
                Token::Integer(1),
                Token::Semicolon,
                Token::Identifier("a".to_string()),
                Token::PercentAssign,
                Token::Integer(2),
                Token::Semicolon,
                Token::Identifier("a".to_string()),
                Token::Equal,
                Token::Identifier("b".to_string()),
                Token::Semicolon,
                Token::Identifier("a".to_string()),
                Token::NotEqual,
                Token::Identifier("b".to_string()),
                Token::Semicolon,
            ]
        );
        Ok(())
    }

    #[test]
    fn float_versus_dot_operator() -> Result<(), ParseError> {
        let tokens = tokenize("1.5 1.+2")?;
        let kinds: Vec<Token> = tokens.into_iter().map(|(token, _)| token).collect();
        assert_eq!(
            kinds,
            vec![
                Token::Float(1.5),
                Token::Integer(1),
                Token::DotPlus,
                Token::Integer(2),
            ]
        );
        Ok(())
    }

    #[test]
    fn illegal_character() {
        assert_eq!(
            tokenize("a = @;"),
            Err(ParseError::IllegalCharacter {
                character: '@',
                line: 1
            })
        );
    }

    #[test]
    fn unterminated_string() {
        assert_eq!(
            tokenize("s = \"oops"),
            Err(ParseError::UnterminatedString { line: 1 })
        );
    }
}
