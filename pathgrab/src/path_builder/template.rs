// Path template engine - parsing and expansion

use crate::entity::Value;
use crate::error::{PathGrabError, Result};
use std::collections::BTreeMap;

/// How a bracketed `[a|b]` alternation is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AlternationMode {
    /// Each alternative produces its own path, like `[a,b]`.
    #[default]
    Expand,
    /// The bracket is emitted verbatim, e.g. for downstream glob tools.
    Verbatim,
}

/// A parsed path template such as
/// `sub-{subject}[/ses-{session}]/run-{run:02d}.[nii,nii.gz]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathTemplate {
    pub raw: String,
    pub segments: Vec<PathSegment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    Literal(String),
    Field(Placeholder),
    /// `[...]` dropped when any of its fields cannot be resolved
    Optional(Vec<PathSegment>),
    /// `[a,b]` exactly one of the alternatives per produced path
    Choice(Vec<Vec<PathSegment>>),
    /// `[a|b]` expanded or kept verbatim depending on `AlternationMode`
    Alternation {
        raw: String,
        options: Vec<Vec<PathSegment>>,
    },
}

/// An entity placeholder: `{name<allowed|values>|default:format}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    pub name: String,
    pub allowed: Option<Vec<String>>,
    pub default: Option<String>,
    pub format: Option<FieldFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldFormat {
    /// `0Nd`: integers left-padded with zeros to N digits
    ZeroPad(usize),
    /// `.Nf`: floats with N decimals
    Precision(usize),
    /// `d` or `s`: plain rendering
    Plain,
}

impl PathTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let chars: Vec<char> = template.chars().collect();
        let mut pos = 0;
        let segments = parse_sequence(template, &chars, &mut pos, false)?;
        Ok(PathTemplate {
            raw: template.to_string(),
            segments,
        })
    }

    /// Names of every entity referenced by the template, in order of first use.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names = Vec::new();
        collect_names(&self.segments, &mut names);
        names
    }

    /// Render every path the template produces for a single assignment of
    /// values. Returns an empty list when a required field is unresolved.
    pub fn render(&self, values: &BTreeMap<String, Value>, mode: AlternationMode) -> Vec<String> {
        render_sequence(&self.segments, values, mode).unwrap_or_default()
    }

    /// The first rendering, if any.
    pub fn render_first(&self, values: &BTreeMap<String, Value>) -> Option<String> {
        self.render(values, AlternationMode::Expand).into_iter().next()
    }
}

fn template_error(template: &str, message: &str) -> PathGrabError {
    PathGrabError::Configuration(format!("Invalid path template '{template}': {message}"))
}

fn parse_sequence(
    template: &str,
    chars: &[char],
    pos: &mut usize,
    in_bracket: bool,
) -> Result<Vec<PathSegment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();

    while *pos < chars.len() {
        let c = chars[*pos];
        match c {
            '{' if chars.get(*pos + 1) == Some(&'{') => {
                literal.push('{');
                *pos += 2;
            }
            '}' if chars.get(*pos + 1) == Some(&'}') => {
                literal.push('}');
                *pos += 2;
            }
            '{' => {
                let end = chars[*pos..]
                    .iter()
                    .position(|&ch| ch == '}')
                    .map(|i| *pos + i)
                    .ok_or_else(|| template_error(template, "unclosed '{'"))?;
                let body: String = chars[*pos + 1..end].iter().collect();
                if !literal.is_empty() {
                    segments.push(PathSegment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(PathSegment::Field(parse_placeholder(template, &body)?));
                *pos = end + 1;
            }
            '}' => return Err(template_error(template, "unmatched '}'")),
            '[' if in_bracket => return Err(template_error(template, "nested '['")),
            '[' => {
                let end = find_bracket_end(chars, *pos)
                    .ok_or_else(|| template_error(template, "unclosed '['"))?;
                let content: String = chars[*pos + 1..end].iter().collect();
                if !literal.is_empty() {
                    segments.push(PathSegment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(parse_bracket(template, &content)?);
                *pos = end + 1;
            }
            ']' => return Err(template_error(template, "unmatched ']'")),
            _ => {
                literal.push(c);
                *pos += 1;
            }
        }
    }

    if !literal.is_empty() {
        segments.push(PathSegment::Literal(literal));
    }
    Ok(segments)
}

fn find_bracket_end(chars: &[char], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &c) in chars.iter().enumerate().skip(start + 1) {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ']' if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

/// Split on `sep` outside of `{...}` placeholders.
fn split_top_level(content: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in content.chars() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
        if c == sep && depth == 0 {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}

fn parse_bracket(template: &str, content: &str) -> Result<PathSegment> {
    let parse_option = |text: &str| {
        let chars: Vec<char> = text.chars().collect();
        let mut pos = 0;
        parse_sequence(template, &chars, &mut pos, true)
    };

    let choices = split_top_level(content, ',');
    if choices.len() > 1 {
        let options = choices
            .iter()
            .map(|c| parse_option(c))
            .collect::<Result<Vec<_>>>()?;
        return Ok(PathSegment::Choice(options));
    }

    let alternatives = split_top_level(content, '|');
    if alternatives.len() > 1 {
        let options = alternatives
            .iter()
            .map(|c| parse_option(c))
            .collect::<Result<Vec<_>>>()?;
        return Ok(PathSegment::Alternation {
            raw: format!("[{content}]"),
            options,
        });
    }

    Ok(PathSegment::Optional(parse_option(content)?))
}

fn parse_placeholder(template: &str, body: &str) -> Result<Placeholder> {
    let name_end = body
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(body.len());
    let name = &body[..name_end];
    if name.is_empty() {
        return Err(template_error(template, "empty placeholder name"));
    }
    let mut rest = &body[name_end..];

    let mut allowed = None;
    if let Some(stripped) = rest.strip_prefix('<') {
        let close = stripped
            .find('>')
            .ok_or_else(|| template_error(template, "unclosed '<' in placeholder"))?;
        allowed = Some(stripped[..close].split('|').map(str::to_string).collect());
        rest = &stripped[close + 1..];
    }

    let mut default = None;
    if let Some(stripped) = rest.strip_prefix('|') {
        let end = stripped.find(':').unwrap_or(stripped.len());
        default = Some(stripped[..end].to_string());
        rest = &stripped[end..];
    }

    let mut format = None;
    if let Some(spec) = rest.strip_prefix(':') {
        format = Some(parse_format(template, spec)?);
        rest = "";
    }

    if !rest.is_empty() {
        return Err(template_error(
            template,
            &format!("unexpected '{rest}' in placeholder '{name}'"),
        ));
    }

    Ok(Placeholder {
        name: name.to_string(),
        allowed,
        default,
        format,
    })
}

fn parse_format(template: &str, spec: &str) -> Result<FieldFormat> {
    if spec == "d" || spec == "s" {
        return Ok(FieldFormat::Plain);
    }
    if let Some(width) = spec.strip_prefix('0').and_then(|s| s.strip_suffix('d')) {
        if let Ok(width) = width.parse() {
            return Ok(FieldFormat::ZeroPad(width));
        }
    }
    if let Some(precision) = spec.strip_prefix('.').and_then(|s| s.strip_suffix('f')) {
        if let Ok(precision) = precision.parse() {
            return Ok(FieldFormat::Precision(precision));
        }
    }
    Err(template_error(
        template,
        &format!("unsupported format directive '{spec}'"),
    ))
}

fn collect_names<'a>(segments: &'a [PathSegment], names: &mut Vec<&'a str>) {
    for segment in segments {
        match segment {
            PathSegment::Literal(_) => {}
            PathSegment::Field(p) => {
                if !names.contains(&p.name.as_str()) {
                    names.push(&p.name);
                }
            }
            PathSegment::Optional(inner) => collect_names(inner, names),
            PathSegment::Choice(options) | PathSegment::Alternation { options, .. } => {
                for option in options {
                    collect_names(option, names);
                }
            }
        }
    }
}

fn render_sequence(
    segments: &[PathSegment],
    values: &BTreeMap<String, Value>,
    mode: AlternationMode,
) -> Option<Vec<String>> {
    let mut outputs = vec![String::new()];

    for segment in segments {
        let pieces: Vec<String> = match segment {
            PathSegment::Literal(text) => vec![text.clone()],
            PathSegment::Field(p) => vec![resolve_field(p, values)?],
            PathSegment::Optional(inner) => {
                render_sequence(inner, values, mode).unwrap_or_else(|| vec![String::new()])
            }
            PathSegment::Alternation { raw, .. } if mode == AlternationMode::Verbatim => {
                vec![raw.clone()]
            }
            PathSegment::Choice(options) | PathSegment::Alternation { options, .. } => {
                let rendered: Vec<String> = options
                    .iter()
                    .filter_map(|o| render_sequence(o, values, mode))
                    .flatten()
                    .collect();
                if rendered.is_empty() {
                    return None;
                }
                rendered
            }
        };

        outputs = outputs
            .iter()
            .flat_map(|prefix| pieces.iter().map(move |p| format!("{prefix}{p}")))
            .collect();
    }

    Some(outputs)
}

fn resolve_field(placeholder: &Placeholder, values: &BTreeMap<String, Value>) -> Option<String> {
    if let Some(value) = values.get(&placeholder.name) {
        let rendered = format_value(value, placeholder.format);
        let permitted = match &placeholder.allowed {
            Some(allowed) => allowed
                .iter()
                .any(|a| *a == rendered || value.matches_literal(&Value::from(a.as_str()))),
            None => true,
        };
        if permitted {
            return Some(rendered);
        }
    }
    placeholder.default.clone()
}

/// Render a value under an optional format directive.
pub fn format_value(value: &Value, format: Option<FieldFormat>) -> String {
    match (format, value) {
        (Some(FieldFormat::ZeroPad(width)), Value::Int(n)) => {
            if *n < 0 {
                format!("-{:0width$}", n.unsigned_abs())
            } else {
                format!("{n:0width$}")
            }
        }
        (Some(FieldFormat::ZeroPad(width)), Value::Float(f)) if f.fract() == 0.0 => {
            format!("{:0width$}", *f as i64)
        }
        (Some(FieldFormat::ZeroPad(width)), Value::Str(s))
            if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) =>
        {
            format!("{s:0>width$}")
        }
        (Some(FieldFormat::Precision(p)), Value::Float(f)) => format!("{f:.p$}"),
        (Some(FieldFormat::Precision(p)), Value::Int(n)) => format!("{:.p$}", *n as f64),
        (Some(FieldFormat::Precision(p)), Value::Str(s)) => match s.parse::<f64>() {
            Ok(f) => format!("{f:.p$}"),
            Err(_) => s.clone(),
        },
        _ => value.to_string(),
    }
}
