//! CSS selector subset
//!
//! Parses and matches the selectors the engine's `select_elements`
//! primitive understands: type, universal, `#id`, `.class`, attribute
//! tests, UI-state pseudo-classes, a few structural pseudo-classes,
//! descendant and child combinators, and comma-separated lists.

use crate::error::{DomError, Result};
use crate::types::ElementState;

/// A parsed comma-separated selector list.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorList(pub Vec<ComplexSelector>);

/// Compound selectors joined by combinators, left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexSelector {
    /// The first entry's combinator is ignored.
    pub parts: Vec<(Combinator, Compound)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// `a b`
    Descendant,
    /// `a > b`
    Child,
}

/// Simple selectors that must all match the same element.
#[derive(Debug, Clone, PartialEq)]
pub struct Compound(pub Vec<SelectorComponent>);

#[derive(Debug, Clone, PartialEq)]
pub enum SelectorComponent {
    /// `*`
    Universal,
    /// Tag name, case-insensitive
    Type(String),
    /// `#id`
    Id(String),
    /// `.class`
    Class(String),
    /// `[attr]`, `[attr=value]`, ...
    Attribute(AttributeSelector),
    /// `:hover`, `:first-child`, ...
    PseudoClass(PseudoClass),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSelector {
    pub name: String,
    pub matcher: Option<AttributeMatcher>,
    pub case_insensitive: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeMatcher {
    /// `[attr=value]`
    Exact(String),
    /// `[attr~=value]` whitespace-separated list contains
    Contains(String),
    /// `[attr|=value]` exact or prefix followed by `-`
    DashMatch(String),
    /// `[attr^=value]`
    Prefix(String),
    /// `[attr$=value]`
    Suffix(String),
    /// `[attr*=value]`
    Substring(String),
}

impl AttributeSelector {
    /// Check an attribute value (`None` when absent).
    pub fn matches(&self, value: Option<&str>) -> bool {
        let (Some(matcher), Some(value)) = (&self.matcher, value) else {
            return self.matcher.is_none() && value.is_some();
        };
        let fold = |s: &str| if self.case_insensitive { s.to_lowercase() } else { s.to_string() };
        let value = fold(value);
        match matcher {
            AttributeMatcher::Exact(expected) => value == fold(expected),
            AttributeMatcher::Contains(expected) => {
                let expected = fold(expected);
                value.split_whitespace().any(|w| w == expected)
            }
            AttributeMatcher::DashMatch(expected) => {
                let expected = fold(expected);
                value == expected || value.starts_with(&format!("{}-", expected))
            }
            AttributeMatcher::Prefix(expected) => !expected.is_empty() && value.starts_with(&fold(expected)),
            AttributeMatcher::Suffix(expected) => !expected.is_empty() && value.ends_with(&fold(expected)),
            AttributeMatcher::Substring(expected) => !expected.is_empty() && value.contains(&fold(expected)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PseudoClass {
    /// Any UI-state pseudo-class, `:current`, `:expanded`, ...
    State(ElementState),
    /// `:enabled`, i.e. not disabled
    Enabled,
    Root,
    FirstChild,
    LastChild,
    OnlyChild,
    /// `:not(compound)`
    Not(Box<Compound>),
}

impl PseudoClass {
    fn state(name: &str) -> Option<ElementState> {
        let state = match name {
            "link" => ElementState::LINK,
            "hover" => ElementState::HOVER,
            "active" => ElementState::ACTIVE,
            "focus" => ElementState::FOCUS,
            "visited" => ElementState::VISITED,
            "current" => ElementState::CURRENT,
            "checked" => ElementState::CHECKED,
            "disabled" => ElementState::DISABLED,
            "read-only" | "readonly" => ElementState::READONLY,
            "expanded" => ElementState::EXPANDED,
            "collapsed" => ElementState::COLLAPSED,
            "incomplete" => ElementState::INCOMPLETE,
            "animating" => ElementState::ANIMATING,
            "focusable" => ElementState::FOCUSABLE,
            "anchor" => ElementState::ANCHOR,
            "synthetic" => ElementState::SYNTHETIC,
            "owns-popup" => ElementState::OWNS_POPUP,
            "tab-focus" => ElementState::TABFOCUS,
            "empty" => ElementState::EMPTY,
            "busy" => ElementState::BUSY,
            "drag-over" => ElementState::DRAG_OVER,
            "drop-target" => ElementState::DROP_TARGET,
            "moving" => ElementState::MOVING,
            "copying" => ElementState::COPYING,
            "drag-source" => ElementState::DRAG_SOURCE,
            "drop-marker" => ElementState::DROP_MARKER,
            "pressed" => ElementState::PRESSED,
            "popup" => ElementState::POPUP,
            "ltr" => ElementState::IS_LTR,
            "rtl" => ElementState::IS_RTL,
            _ => return None,
        };
        Some(state)
    }
}

/// What the matcher needs to know about an element.
pub trait ElementContext: Sized {
    fn tag_name(&self) -> &str;
    fn attribute(&self, name: &str) -> Option<&str>;
    fn state(&self) -> ElementState;
    /// Parent element; `None` at the top of the tree.
    fn parent(&self) -> Option<Self>;
    /// 1-based index among element siblings and the sibling count.
    fn sibling_position(&self) -> (usize, usize);
    /// Is this the document's root element?
    fn is_root(&self) -> bool;
}

impl SelectorList {
    /// Parse a selector list; fails with [`DomError::InvalidSelector`].
    pub fn parse(input: &str) -> Result<Self> {
        let mut parser = Parser { input, pos: 0 };
        let mut list = Vec::new();
        loop {
            list.push(parser.complex()?);
            parser.skip_ws();
            match parser.peek() {
                None => break,
                Some(',') => parser.pos += 1,
                Some(_) => return Err(parser.error()),
            }
        }
        Ok(Self(list))
    }

    /// Does any selector in the list match `el`?
    pub fn matches<E: ElementContext>(&self, el: &E) -> bool {
        self.0.iter().any(|s| s.matches(el))
    }
}

impl ComplexSelector {
    pub fn matches<E: ElementContext>(&self, el: &E) -> bool {
        match_from(&self.parts, self.parts.len() - 1, el)
    }
}

/// Match `parts[..=idx]` with `parts[idx]` anchored on `el`.
fn match_from<E: ElementContext>(parts: &[(Combinator, Compound)], idx: usize, el: &E) -> bool {
    let (combinator, compound) = &parts[idx];
    if !compound.matches(el) {
        return false;
    }
    if idx == 0 {
        return true;
    }
    match combinator {
        Combinator::Child => el.parent().is_some_and(|p| match_from(parts, idx - 1, &p)),
        Combinator::Descendant => {
            let mut ancestor = el.parent();
            while let Some(a) = ancestor {
                if match_from(parts, idx - 1, &a) {
                    return true;
                }
                ancestor = a.parent();
            }
            false
        }
    }
}

impl Compound {
    pub fn matches<E: ElementContext>(&self, el: &E) -> bool {
        self.0.iter().all(|c| match_component(c, el))
    }
}

/// Match one simple selector against an element.
pub fn match_component<E: ElementContext>(component: &SelectorComponent, el: &E) -> bool {
    match component {
        SelectorComponent::Universal => true,
        SelectorComponent::Type(tag) => el.tag_name().eq_ignore_ascii_case(tag),
        SelectorComponent::Id(id) => el.attribute("id") == Some(id.as_str()),
        SelectorComponent::Class(class) => el
            .attribute("class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class)),
        SelectorComponent::Attribute(attr) => attr.matches(el.attribute(&attr.name)),
        SelectorComponent::PseudoClass(pseudo) => match pseudo {
            PseudoClass::State(state) => el.state().contains(*state),
            PseudoClass::Enabled => !el.state().has(ElementState::DISABLED),
            PseudoClass::Root => el.is_root(),
            PseudoClass::FirstChild => el.sibling_position().0 == 1,
            PseudoClass::LastChild => {
                let (index, count) = el.sibling_position();
                index == count
            }
            PseudoClass::OnlyChild => el.sibling_position().1 == 1,
            PseudoClass::Not(inner) => !inner.matches(el),
        },
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self) -> DomError {
        DomError::InvalidSelector(self.input.to_string())
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while let Some(c) = self.peek().filter(|c| c.is_whitespace()) {
            self.pos += c.len_utf8();
        }
        self.pos != start
    }

    fn complex(&mut self) -> Result<ComplexSelector> {
        self.skip_ws();
        let mut parts = vec![(Combinator::Descendant, self.compound()?)];
        loop {
            let had_ws = self.skip_ws();
            let combinator = match self.peek() {
                None | Some(',') | Some(')') => break,
                Some('>') => {
                    self.pos += 1;
                    self.skip_ws();
                    Combinator::Child
                }
                Some(_) if had_ws => Combinator::Descendant,
                Some(_) => return Err(self.error()),
            };
            parts.push((combinator, self.compound()?));
        }
        Ok(ComplexSelector { parts })
    }

    fn compound(&mut self) -> Result<Compound> {
        let mut components = Vec::new();
        if self.eat('*') {
            components.push(SelectorComponent::Universal);
        } else if self.peek().is_some_and(is_ident_char) {
            components.push(SelectorComponent::Type(self.ident()?.to_ascii_lowercase()));
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    components.push(SelectorComponent::Id(self.ident()?));
                }
                Some('.') => {
                    self.pos += 1;
                    components.push(SelectorComponent::Class(self.ident()?));
                }
                Some('[') => {
                    self.pos += 1;
                    components.push(SelectorComponent::Attribute(self.attribute()?));
                }
                Some(':') => {
                    self.pos += 1;
                    components.push(SelectorComponent::PseudoClass(self.pseudo()?));
                }
                _ => break,
            }
        }
        if components.is_empty() {
            return Err(self.error());
        }
        Ok(Compound(components))
    }

    fn ident(&mut self) -> Result<String> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.bump();
        }
        if self.pos == start {
            return Err(self.error());
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn attribute(&mut self) -> Result<AttributeSelector> {
        self.skip_ws();
        let name = self.ident()?.to_ascii_lowercase();
        self.skip_ws();
        let op = match self.peek() {
            Some(']') => {
                self.pos += 1;
                return Ok(AttributeSelector { name, matcher: None, case_insensitive: false });
            }
            Some('=') => {
                self.pos += 1;
                '='
            }
            Some(c @ ('~' | '|' | '^' | '$' | '*')) => {
                self.pos += 1;
                if !self.eat('=') {
                    return Err(self.error());
                }
                c
            }
            _ => return Err(self.error()),
        };
        self.skip_ws();
        let value = self.attribute_value()?;
        self.skip_ws();
        let case_insensitive = if self.peek().is_some_and(|c| c == 'i' || c == 'I') {
            self.pos += 1;
            self.skip_ws();
            true
        } else {
            false
        };
        if !self.eat(']') {
            return Err(self.error());
        }
        let matcher = match op {
            '=' => AttributeMatcher::Exact(value),
            '~' => AttributeMatcher::Contains(value),
            '|' => AttributeMatcher::DashMatch(value),
            '^' => AttributeMatcher::Prefix(value),
            '$' => AttributeMatcher::Suffix(value),
            _ => AttributeMatcher::Substring(value),
        };
        Ok(AttributeSelector { name, matcher: Some(matcher), case_insensitive })
    }

    fn attribute_value(&mut self) -> Result<String> {
        match self.peek() {
            Some(quote @ ('\'' | '"')) => {
                self.pos += 1;
                let start = self.pos;
                loop {
                    match self.bump() {
                        Some(c) if c == quote => break,
                        Some(_) => {}
                        None => return Err(self.error()),
                    }
                }
                Ok(self.input[start..self.pos - 1].to_string())
            }
            _ => self.ident(),
        }
    }

    fn pseudo(&mut self) -> Result<PseudoClass> {
        let name = self.ident()?.to_ascii_lowercase();
        if let Some(state) = PseudoClass::state(&name) {
            return Ok(PseudoClass::State(state));
        }
        let pseudo = match name.as_str() {
            "enabled" => PseudoClass::Enabled,
            "root" => PseudoClass::Root,
            "first-child" => PseudoClass::FirstChild,
            "last-child" => PseudoClass::LastChild,
            "only-child" => PseudoClass::OnlyChild,
            "not" => {
                if !self.eat('(') {
                    return Err(self.error());
                }
                self.skip_ws();
                let inner = self.compound()?;
                self.skip_ws();
                if !self.eat(')') {
                    return Err(self.error());
                }
                PseudoClass::Not(Box::new(inner))
            }
            _ => return Err(self.error()),
        };
        Ok(pseudo)
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}
