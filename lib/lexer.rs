use crate::token::Token;

pub struct Lexer {
    chars: Vec<char>,
    position: usize,
    char: Option<char>,
}

/// Collects every token of `input` eagerly.
pub fn tokenize(input: &str) -> Vec<Token> {
    Lexer::new(input).collect()
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let char = chars.first().copied();
        Self {
            chars,
            position: 0,
            char,
        }
    }

    /// Returns the next token, or `None` once the input is exhausted.
    pub fn next_token(&mut self) -> Option<Token> {
        while self
            .char
            .is_some_and(|char| matches!(char, ' ' | '\t' | '\r' | '\n'))
        {
            self.read_char();
        }

        let char = self.char?;

        let token = match char {
            '=' => self.two_char_token('=', Token::Assign, Token::Eq),
            '!' => self.two_char_token('=', Token::Bang, Token::NotEq),
            '<' => self.two_char_token('=', Token::Lt, Token::LtEq),
            '>' => self.two_char_token('=', Token::Gt, Token::GtEq),
            '&' => self.two_char_token('&', Token::Ampersand, Token::And),
            '|' => self.two_char_token('|', Token::Pipe, Token::Or),
            ':' => self.two_char_token('=', Token::Colon, Token::Bind),
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Asterisk,
            '/' => Token::Slash,
            '%' => Token::Percent,
            ';' => Token::Semicolon,
            ',' => Token::Comma,
            '(' => Token::Lparen,
            ')' => Token::Rparen,
            '{' => Token::Lbrace,
            '}' => Token::Rbrace,
            '[' => Token::Lbracket,
            ']' => Token::Rbracket,
            '"' => Token::String(self.read_string()),
            _ if char.is_ascii_digit() => return Some(self.read_number()),
            _ if is_letter(char) => {
                let literal = self.read_while(is_letter);
                return Some(Token::lookup_ident(literal));
            }
            _ => Token::Illegal(char.to_string()),
        };

        self.read_char();

        Some(token)
    }

    fn read_char(&mut self) {
        self.position += 1;
        self.char = self.chars.get(self.position).copied();
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.position + 1).copied()
    }

    fn two_char_token(&mut self, second: char, single: Token, double: Token) -> Token {
        if self.peek_char() == Some(second) {
            self.read_char();
            double
        } else {
            single
        }
    }

    fn read_while(&mut self, condition: impl Fn(char) -> bool) -> String {
        let mut literal = String::new();
        while let Some(char) = self.char {
            if !condition(char) {
                break;
            }
            literal.push(char);
            self.read_char();
        }
        literal
    }

    fn read_number(&mut self) -> Token {
        let integer = self.read_while(|char| char.is_ascii_digit());

        if self.char != Some('.') {
            return Token::Int(integer);
        }

        if self.peek_char().is_some_and(|char| char.is_ascii_digit()) {
            self.read_char();
            let fraction = self.read_while(|char| char.is_ascii_digit());
            Token::Float(format!("{integer}.{fraction}"))
        } else {
            self.read_char();
            Token::Illegal(format!("{integer}."))
        }
    }

    // Leaves the cursor on the closing quote, or past the end when unterminated.
    fn read_string(&mut self) -> String {
        let mut literal = String::new();
        self.read_char();
        while let Some(char) = self.char {
            match char {
                '"' => break,
                '\\' => {
                    self.read_char();
                    match self.char {
                        Some('"') => literal.push('"'),
                        Some('n') => literal.push('\n'),
                        Some('r') => literal.push('\r'),
                        Some('t') => literal.push('\t'),
                        Some('\\') => literal.push('\\'),
                        Some(other) => {
                            literal.push('\\');
                            literal.push(other);
                        }
                        None => {
                            literal.push('\\');
                            break;
                        }
                    }
                }
                _ => literal.push(char),
            }
            self.read_char();
        }
        literal
    }
}

impl Iterator for Lexer {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

fn is_letter(char: char) -> bool {
    char.is_ascii_alphabetic() || char == '_'
}
