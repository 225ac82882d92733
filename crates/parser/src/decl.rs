//! Declaration-block parsing on top of `cssparser`.
//! Spec: <https://www.w3.org/TR/css-syntax-3/#declaration-rule-list>

use cssparser::AtRuleParser as CssAtRuleParser;
use cssparser::BasicParseErrorKind;
use cssparser::CowRcStr;
use cssparser::ParseError;
use cssparser::Parser;
use cssparser::ParserInput;
use cssparser::ParserState;
use cssparser::QualifiedRuleParser as CssQualifiedRuleParser;
use cssparser::RuleBodyItemParser as CssRuleBodyItemParser;
use cssparser::RuleBodyParser as CssRuleBodyParser;

/// A single declaration (property and raw value text).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    /// Property name. Lowercased, except custom properties (`--*`) which are
    /// case-sensitive and kept verbatim.
    pub name: String,
    /// Raw value text with any `!important` tail removed.
    pub value: String,
}

/// Split an `!important` suffix off a raw value.
fn split_important_tail(value: &str) -> &str {
    let trimmed = value.trim();
    if let Some(position) = trimmed.rfind('!') {
        let tail = trimmed[position + 1..].trim();
        if tail.eq_ignore_ascii_case("important") {
            return trimmed[..position].trim_end();
        }
    }
    trimmed
}

/// Declaration parser that records the property name and its raw value text.
struct DeclBodyParser;

impl cssparser::DeclarationParser<'_> for DeclBodyParser {
    type Declaration = Declaration;
    type Error = ();

    fn parse_value<'input>(
        &mut self,
        name: CowRcStr<'input>,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::Declaration, ParseError<'input, Self::Error>> {
        let start = input.position();
        // Consume the remainder of the declaration item.
        while input.next_including_whitespace_and_comments().is_ok() {}
        let raw = input.slice_from(start);
        let name = if name.starts_with("--") {
            name.to_string()
        } else {
            name.to_ascii_lowercase()
        };
        Ok(Declaration {
            name,
            value: split_important_tail(raw).to_owned(),
        })
    }
}

impl CssAtRuleParser<'_> for DeclBodyParser {
    type Prelude = ();
    type AtRule = Declaration; // Not produced
    type Error = ();

    #[inline]
    fn parse_prelude<'input>(
        &mut self,
        _name: CowRcStr<'input>,
        _input: &mut Parser<'input, '_>,
    ) -> Result<Self::Prelude, ParseError<'input, Self::Error>> {
        Ok(())
    }

    #[inline]
    fn parse_block<'input>(
        &mut self,
        _prelude: Self::Prelude,
        _state: &ParserState,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::AtRule, ParseError<'input, Self::Error>> {
        Err(input.new_error(BasicParseErrorKind::AtRuleBodyInvalid))
    }

    #[inline]
    fn rule_without_block(
        &mut self,
        _prelude: Self::Prelude,
        _state: &ParserState,
    ) -> Result<Self::AtRule, Self::Error> {
        Err(())
    }
}

impl CssQualifiedRuleParser<'_> for DeclBodyParser {
    type Prelude = ();
    type QualifiedRule = Declaration; // Not produced
    type Error = ();

    #[inline]
    fn parse_prelude<'input>(
        &mut self,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::Prelude, ParseError<'input, Self::Error>> {
        Err(input.new_error(BasicParseErrorKind::QualifiedRuleInvalid))
    }

    #[inline]
    fn parse_block<'input>(
        &mut self,
        _prelude: Self::Prelude,
        _state: &ParserState,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::QualifiedRule, ParseError<'input, Self::Error>> {
        Err(input.new_error(BasicParseErrorKind::QualifiedRuleInvalid))
    }
}

impl CssRuleBodyItemParser<'_, Declaration, ()> for DeclBodyParser {
    fn parse_declarations(&self) -> bool {
        true
    }
    fn parse_qualified(&self) -> bool {
        false
    }
}

/// Parse the declarations of a rule body fragment. Malformed items are
/// skipped; nothing here ever fails.
pub fn parse_declarations(body: &str) -> Vec<Declaration> {
    let mut input = ParserInput::new(body);
    let mut parser = Parser::new(&mut input);
    let mut body_parser = DeclBodyParser;
    let mut out = Vec::new();
    for declaration in CssRuleBodyParser::new(&mut parser, &mut body_parser).flatten() {
        if !declaration.value.is_empty() {
            out.push(declaration);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_declarations() {
        let decls = parse_declarations("color: red; padding: 8px 16px");
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].name, "color");
        assert_eq!(decls[0].value, "red");
        assert_eq!(decls[1].value, "8px 16px");
    }

    #[test]
    fn important_tail_is_removed() {
        let decls = parse_declarations("width: 50% !important;");
        assert_eq!(decls[0].value, "50%");
    }

    #[test]
    fn custom_property_names_keep_case() {
        let decls = parse_declarations("--mainColor: #fff; COLOR: blue");
        assert_eq!(decls[0].name, "--mainColor");
        assert_eq!(decls[1].name, "color");
    }

    #[test]
    fn malformed_items_are_skipped() {
        let decls = parse_declarations("color red; width: 10px");
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].name, "width");
    }

    #[test]
    fn function_values_survive_verbatim() {
        let decls = parse_declarations("width: calc(100% - 2rem)");
        assert_eq!(decls[0].value, "calc(100% - 2rem)");
    }
}
