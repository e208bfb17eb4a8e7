// ==========================================
// 火车模型收藏管理 - 价格安全求值器
// ==========================================
// 职责: 对价格表达式做受限的四则运算求值
// 约束: 字符集白名单 + 显式递归下降，杜绝语法面扩大
// 任何异常一律退化为 0，绝不向调用方抛错
// ==========================================

/// 安全计算价格表达式
///
/// 支持: 十进制数字、二元 + - * /、一元负号、括号分组。
/// 含白名单以外字符、语法错误、除零、结果非有限值时返回 0。
///
/// 单条录入与批量导入共用此入口，行为必须一致。
pub fn evaluate_price(expression: &str) -> f64 {
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    // 白名单: 数字、四则运算符、括号、小数点、空白
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || "+-*/().".contains(c) || c.is_whitespace())
    {
        tracing::debug!(expr = trimmed, "价格表达式含非法字符");
        return 0.0;
    }

    match Parser::new(trimmed).parse() {
        Ok(value) if value.is_finite() => value,
        Ok(_) => {
            tracing::debug!(expr = trimmed, "价格表达式结果非有限值");
            0.0
        }
        Err(reason) => {
            tracing::debug!(expr = trimmed, reason, "价格表达式求值失败");
            0.0
        }
    }
}

/// 递归下降解析器
///
/// 文法:
///   expr  := term (('+'|'-') term)*
///   term  := unary (('*'|'/') unary)*
///   unary := '-' unary | atom
///   atom  := '(' expr ')' | number
///
/// 一元正号不在文法内，视为语法错误。
struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { bytes: input.as_bytes(), pos: 0 }
    }

    fn parse(mut self) -> Result<f64, &'static str> {
        let value = self.parse_expr()?;
        self.skip_whitespace();
        if self.pos != self.bytes.len() {
            return Err("表达式存在多余内容");
        }
        Ok(value)
    }

    fn parse_expr(&mut self) -> Result<f64, &'static str> {
        let mut value = self.parse_term()?;
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b'+') => {
                    self.pos += 1;
                    value += self.parse_term()?;
                }
                Some(b'-') => {
                    self.pos += 1;
                    value -= self.parse_term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn parse_term(&mut self) -> Result<f64, &'static str> {
        let mut value = self.parse_unary()?;
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b'*') => {
                    self.pos += 1;
                    value *= self.parse_unary()?;
                }
                Some(b'/') => {
                    self.pos += 1;
                    let divisor = self.parse_unary()?;
                    if divisor == 0.0 {
                        return Err("除数为零");
                    }
                    value /= divisor;
                }
                _ => return Ok(value),
            }
        }
    }

    fn parse_unary(&mut self) -> Result<f64, &'static str> {
        self.skip_whitespace();
        if self.peek() == Some(b'-') {
            self.pos += 1;
            return Ok(-self.parse_unary()?);
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<f64, &'static str> {
        self.skip_whitespace();
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let value = self.parse_expr()?;
                self.skip_whitespace();
                if self.peek() != Some(b')') {
                    return Err("括号不匹配");
                }
                self.pos += 1;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == b'.' => self.parse_number(),
            _ => Err("期望数字或括号"),
        }
    }

    fn parse_number(&mut self) -> Result<f64, &'static str> {
        let start = self.pos;
        let mut seen_dot = false;
        let mut seen_digit = false;

        while let Some(c) = self.peek() {
            match c {
                b'0'..=b'9' => {
                    seen_digit = true;
                    self.pos += 1;
                }
                b'.' if !seen_dot => {
                    seen_dot = true;
                    self.pos += 1;
                }
                _ => break,
            }
        }

        if !seen_digit {
            return Err("数字格式错误");
        }

        // 字节区间内只有 ASCII 数字和小数点，必为合法 UTF-8
        std::str::from_utf8(&self.bytes[start..self.pos])
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or("数字格式错误")
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_arithmetic() {
        assert_eq!(evaluate_price("288+538"), 826.0);
        assert_eq!(evaluate_price("10+2*3"), 16.0);
        assert_eq!(evaluate_price("(10+2)*3"), 36.0);
        assert_eq!(evaluate_price("100/4"), 25.0);
        assert_eq!(evaluate_price("10-20"), -10.0);
    }

    #[test]
    fn test_decimals_and_whitespace() {
        assert_eq!(evaluate_price(" 1.5 + 2.5 "), 4.0);
        assert_eq!(evaluate_price("0.1*10"), 1.0);
        assert_eq!(evaluate_price(".5+.5"), 1.0);
    }

    #[test]
    fn test_unary_minus() {
        assert_eq!(evaluate_price("-5"), -5.0);
        assert_eq!(evaluate_price("--5"), 5.0);
        assert_eq!(evaluate_price("10*-2"), -20.0);
        assert_eq!(evaluate_price("-(3+2)"), -5.0);
    }

    #[test]
    fn test_unary_plus_rejected() {
        // 一元正号不在文法内
        assert_eq!(evaluate_price("+5"), 0.0);
    }

    #[test]
    fn test_division_by_zero_is_zero() {
        assert_eq!(evaluate_price("5/0"), 0.0);
        assert_eq!(evaluate_price("1/(2-2)"), 0.0);
    }

    #[test]
    fn test_illegal_characters_are_zero() {
        assert_eq!(evaluate_price("abc"), 0.0);
        assert_eq!(evaluate_price("1+x"), 0.0);
        assert_eq!(evaluate_price("pow(2,3)"), 0.0);
        assert_eq!(evaluate_price("１００"), 0.0); // 全角数字不在白名单
    }

    #[test]
    fn test_malformed_syntax_is_zero() {
        assert_eq!(evaluate_price(""), 0.0);
        assert_eq!(evaluate_price("   "), 0.0);
        assert_eq!(evaluate_price("1+"), 0.0);
        assert_eq!(evaluate_price("(1+2"), 0.0);
        assert_eq!(evaluate_price("1 2"), 0.0);
        assert_eq!(evaluate_price("1..2"), 0.0);
        assert_eq!(evaluate_price("()"), 0.0);
    }

    #[test]
    fn test_plain_number_passthrough() {
        assert_eq!(evaluate_price("288"), 288.0);
        assert_eq!(evaluate_price("99.5"), 99.5);
    }
}
