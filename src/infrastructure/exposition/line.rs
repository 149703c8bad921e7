//! Single-line tokenizer for the text exposition format.
//!
//! Each line of a document is one of: blank, a free-form comment, a
//! `# HELP` / `# TYPE` descriptor, or a sample. Metric and label names may
//! be written either in the legacy charset or as quoted UTF-8 strings.

use prometheus::proto::MetricType;

/// A classified line of an exposition document.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Line {
    Blank,
    Comment,
    Help { name: String, text: String },
    Type { name: String, kind: MetricType },
    Sample(Sample),
}

/// One sample line: `name{labels} value [timestamp]`.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Sample {
    pub name: String,
    pub labels: Vec<(String, String)>,
    pub value: f64,
    pub timestamp_ms: Option<i64>,
}

#[cfg(test)]
impl Sample {
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(label, _)| label == name)
            .map(|(_, value)| value.as_str())
    }
}

pub(super) fn parse_line(line: &str) -> Result<Line, String> {
    let line = line.trim_end_matches('\r');
    let mut cursor = Cursor::new(line);
    cursor.skip_whitespace();

    match cursor.peek() {
        None => Ok(Line::Blank),
        Some('#') => {
            cursor.bump();
            parse_comment(cursor)
        }
        Some(_) => parse_sample(cursor).map(Line::Sample),
    }
}

fn parse_comment(mut cursor: Cursor<'_>) -> Result<Line, String> {
    cursor.skip_whitespace();
    let keyword = cursor.take_while(|c| !c.is_whitespace());

    match keyword {
        "HELP" => {
            cursor.expect_whitespace("HELP")?;
            let name = cursor.metric_name()?;
            let text = if cursor.at_end() {
                String::new()
            } else {
                cursor.expect_whitespace("metric name in HELP line")?;
                unescape_help(cursor.rest())?
            };
            Ok(Line::Help { name, text })
        }
        "TYPE" => {
            cursor.expect_whitespace("TYPE")?;
            let name = cursor.metric_name()?;
            cursor.expect_whitespace("metric name in TYPE line")?;
            let kind = cursor.take_while(|c| !c.is_whitespace());
            cursor.skip_whitespace();
            if !cursor.at_end() {
                return Err(format!("unexpected text after type {:?}", kind));
            }
            Ok(Line::Type {
                name,
                kind: parse_metric_type(kind)?,
            })
        }
        _ => Ok(Line::Comment),
    }
}

fn parse_metric_type(kind: &str) -> Result<MetricType, String> {
    match kind {
        "counter" => Ok(MetricType::COUNTER),
        "gauge" => Ok(MetricType::GAUGE),
        "histogram" => Ok(MetricType::HISTOGRAM),
        "summary" => Ok(MetricType::SUMMARY),
        "untyped" => Ok(MetricType::UNTYPED),
        other => Err(format!("unknown metric type {:?}", other)),
    }
}

fn parse_sample(mut cursor: Cursor<'_>) -> Result<Sample, String> {
    let mut name = if cursor.peek() == Some('{') {
        None
    } else {
        Some(cursor.legacy_name(is_metric_name_start, is_metric_name_char, "metric")?)
    };

    let mut labels: Vec<(String, String)> = Vec::new();
    let mut separated = cursor.skip_whitespace();

    if cursor.peek() == Some('{') {
        cursor.bump();
        loop {
            cursor.skip_whitespace();
            match cursor.peek() {
                Some('}') => {
                    cursor.bump();
                    break;
                }
                None => return Err("unterminated label set".to_string()),
                _ => {}
            }

            let label_name = if cursor.peek() == Some('"') {
                let quoted = cursor.quoted()?;
                cursor.skip_whitespace();
                if matches!(cursor.peek(), Some(',') | Some('}')) {
                    // A bare quoted string inside braces names the metric.
                    if name.is_some() {
                        return Err(format!("metric name {:?} given twice", quoted));
                    }
                    if quoted.is_empty() {
                        return Err("empty metric name".to_string());
                    }
                    name = Some(quoted);
                    cursor.eat(',');
                    continue;
                }
                quoted
            } else {
                cursor.legacy_name(is_label_name_start, is_label_name_char, "label")?
            };

            if label_name.is_empty() {
                return Err("empty label name".to_string());
            }

            cursor.skip_whitespace();
            if !cursor.eat('=') {
                return Err(format!("expected '=' after label name {:?}", label_name));
            }
            cursor.skip_whitespace();
            if cursor.peek() != Some('"') {
                return Err(format!("expected quoted value for label {:?}", label_name));
            }
            let label_value = cursor.quoted()?;

            if labels.iter().any(|(existing, _)| *existing == label_name) {
                return Err(format!("duplicate label name {:?}", label_name));
            }
            labels.push((label_name, label_value));

            cursor.skip_whitespace();
            match cursor.peek() {
                Some(',') => cursor.bump(),
                Some('}') => {}
                _ => return Err("expected ',' or '}' in label set".to_string()),
            }
        }
        separated = cursor.skip_whitespace();
    }

    let name = name.ok_or_else(|| "sample without metric name".to_string())?;

    if !separated {
        return match cursor.peek() {
            Some(c) => Err(format!("unexpected character {:?} after {:?}", c, name)),
            None => Err(format!("missing value for {:?}", name)),
        };
    }
    let value_token = cursor.take_while(|c| !c.is_whitespace());
    let value = value_token
        .parse::<f64>()
        .map_err(|_| format!("invalid sample value {:?}", value_token))?;

    cursor.skip_whitespace();
    let timestamp_ms = if cursor.at_end() {
        None
    } else {
        let token = cursor.take_while(|c| !c.is_whitespace());
        let timestamp = token
            .parse::<i64>()
            .map_err(|_| format!("invalid timestamp {:?}", token))?;
        cursor.skip_whitespace();
        if !cursor.at_end() {
            return Err(format!("unexpected text after timestamp {:?}", cursor.rest()));
        }
        Some(timestamp)
    };

    Ok(Sample {
        name,
        labels,
        value,
        timestamp_ms,
    })
}

fn unescape_help(raw: &str) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some(other) => return Err(format!("invalid escape sequence '\\{}' in HELP", other)),
            None => return Err("dangling escape at end of HELP".to_string()),
        }
    }
    Ok(out)
}

fn is_metric_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == ':'
}

fn is_metric_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == ':'
}

fn is_label_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_label_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { rest: input }
    }

    fn peek(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.rest = &self.rest[c.len_utf8()..];
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.rest.is_empty()
    }

    fn rest(&self) -> &'a str {
        self.rest
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let end = self
            .rest
            .char_indices()
            .find(|(_, c)| !pred(*c))
            .map(|(i, _)| i)
            .unwrap_or(self.rest.len());
        let (taken, rest) = self.rest.split_at(end);
        self.rest = rest;
        taken
    }

    /// Returns whether any whitespace was skipped.
    fn skip_whitespace(&mut self) -> bool {
        !self.take_while(|c| c == ' ' || c == '\t').is_empty()
    }

    fn expect_whitespace(&mut self, after: &str) -> Result<(), String> {
        match self.peek() {
            Some(' ') | Some('\t') => {
                self.skip_whitespace();
                Ok(())
            }
            Some(c) => Err(format!("unexpected character {:?} after {}", c, after)),
            None => Err(format!("unexpected end of line after {}", after)),
        }
    }

    fn legacy_name(
        &mut self,
        start: fn(char) -> bool,
        rest: fn(char) -> bool,
        what: &str,
    ) -> Result<String, String> {
        match self.peek() {
            Some(c) if start(c) => {}
            Some(c) => return Err(format!("invalid {} name starting with {:?}", what, c)),
            None => return Err(format!("missing {} name", what)),
        }
        Ok(self.take_while(rest).to_string())
    }

    /// Metric name in a HELP or TYPE line, legacy or quoted.
    fn metric_name(&mut self) -> Result<String, String> {
        if self.peek() == Some('"') {
            let name = self.quoted()?;
            if name.is_empty() {
                return Err("empty metric name".to_string());
            }
            return Ok(name);
        }
        let name = self.legacy_name(is_metric_name_start, is_metric_name_char, "metric")?;
        match self.peek() {
            None | Some(' ') | Some('\t') => Ok(name),
            Some(c) => Err(format!("invalid character {:?} in metric name {:?}", c, name)),
        }
    }

    /// Double-quoted string with `\\`, `\"` and `\n` escapes.
    fn quoted(&mut self) -> Result<String, String> {
        if !self.eat('"') {
            return Err("expected '\"'".to_string());
        }
        let mut out = String::new();
        loop {
            let c = self.peek().ok_or_else(|| "unterminated quoted string".to_string())?;
            self.bump();
            match c {
                '"' => return Ok(out),
                '\\' => {
                    let escaped = self
                        .peek()
                        .ok_or_else(|| "unterminated quoted string".to_string())?;
                    self.bump();
                    match escaped {
                        '\\' => out.push('\\'),
                        '"' => out.push('"'),
                        'n' => out.push('\n'),
                        other => {
                            return Err(format!("invalid escape sequence '\\{}'", other));
                        }
                    }
                }
                other => out.push(other),
            }
        }
    }
}
