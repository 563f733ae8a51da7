//! DASH segment name templates.
//!
//! Supports the `$Number$`, `$Time$`, `$Bandwidth$` and
//! `$RepresentationID$` identifiers, the `$Number%05d$`-style width
//! format, and `$$` as an escaped dollar sign.
use crate::error::{Error, Result};

/// Values substituted into a segment template.
#[derive(Clone, Copy, Debug, Default)]
pub struct TemplateParams<'a> {
    pub number: u64,
    pub time: u64,
    pub bandwidth: u32,
    pub representation_id: &'a str,
}

/// Expand a segment template.
pub fn fill_template(template: &str, params: &TemplateParams) -> Result<String> {
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;

    while let Some(start) = rest.find('$') {
        out.push_str(&rest[..start]);
        rest = &rest[start + 1..];
        let end = rest
            .find('$')
            .ok_or_else(|| Error::invalid_argument(format!("unclosed '$' in template '{}'", template)))?;
        let ident = &rest[..end];
        rest = &rest[end + 1..];

        if ident.is_empty() {
            // "$$" is a literal dollar sign.
            out.push('$');
            continue;
        }

        let (name, width) = match ident.find('%') {
            Some(idx) => (&ident[..idx], parse_width(&ident[idx..])?),
            None => (ident, 1),
        };
        match name {
            "Number" => out.push_str(&format!("{:0width$}", params.number, width = width)),
            "Time" => out.push_str(&format!("{:0width$}", params.time, width = width)),
            "Bandwidth" => out.push_str(&format!("{:0width$}", params.bandwidth, width = width)),
            "RepresentationID" => out.push_str(params.representation_id),
            _ => {
                return Err(Error::invalid_argument(format!(
                    "unknown template identifier '${}$'",
                    ident
                )))
            },
        }
    }
    out.push_str(rest);
    Ok(out)
}

// "%05d" -> 5.
fn parse_width(fmt: &str) -> Result<usize> {
    let digits = fmt
        .strip_prefix("%0")
        .and_then(|s| s.strip_suffix('d'))
        .ok_or_else(|| Error::invalid_argument(format!("bad template format tag '{}'", fmt)))?;
    digits
        .parse::<usize>()
        .map_err(|_| Error::invalid_argument(format!("bad template width '{}'", fmt)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_and_time() {
        let params = TemplateParams {
            number: 7,
            time: 90000,
            bandwidth: 1200000,
            representation_id: "video_1",
        };
        assert_eq!(fill_template("seg_$Number$.m4s", &params).unwrap(), "seg_7.m4s");
        assert_eq!(fill_template("seg_$Time$.m4s", &params).unwrap(), "seg_90000.m4s");
        assert_eq!(
            fill_template("$RepresentationID$/$Bandwidth$/$Number%05d$.m4s", &params).unwrap(),
            "video_1/1200000/00007.m4s"
        );
    }

    #[test]
    fn escaped_dollar() {
        let params = TemplateParams::default();
        assert_eq!(fill_template("a$$b", &params).unwrap(), "a$b");
    }

    #[test]
    fn bad_templates_rejected() {
        let params = TemplateParams::default();
        assert!(fill_template("seg_$Number", &params).is_err());
        assert!(fill_template("seg_$Nope$", &params).is_err());
        assert!(fill_template("seg_$Number%5x$", &params).is_err());
    }
}
