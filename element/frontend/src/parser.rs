#![allow(clippy::upper_case_acronyms)]

//! Parser for Element programs.
use super::ast::{self, Body, DeclKind, Declaration, Expression, PortDef};
use element_utils::{self, ElementResult, Id, Span};
use pest_consume::{Error, Parser, match_nodes};
use std::fs;
use std::path::Path;

type ParseResult<T> = Result<T, Error<Rule>>;

/// Data associated with parsing the file.
#[derive(Clone)]
struct UserData {
    /// Name of the source being parsed
    pub file: Id,
}

type Node<'i> = pest_consume::Node<'i, Rule, UserData>;

// include the grammar file so that Cargo knows to rebuild this file on grammar changes
const _GRAMMAR: &str = include_str!("syntax.pest");

#[derive(Parser)]
#[grammar = "syntax.pest"]
pub struct ElementParser;

/// A postfix operation applied to an expression.
enum Suffix {
    Call(Vec<Expression>, Span),
    Member(Id, Span),
}

impl ElementParser {
    /// Parse an Element source file from disk.
    pub fn parse_file(path: &Path) -> ElementResult<ast::SourceFile> {
        let content = fs::read(path).map_err(|err| {
            element_utils::Error::invalid_file(format!(
                "Failed to read {}: {err}",
                path.to_string_lossy(),
            ))
        })?;
        let text = std::str::from_utf8(&content)?;
        Self::parse_source(&path.to_string_lossy(), text)
    }

    /// Parse source text registered under `name`.
    pub fn parse_source(name: &str, text: &str) -> ElementResult<ast::SourceFile> {
        let time = std::time::Instant::now();
        let user_data = UserData {
            file: Id::new(name),
        };
        let inputs =
            ElementParser::parse_with_userdata(Rule::file, text, user_data)
                .map_err(|e| e.with_path(name))
                .map_err(|e| {
                    element_utils::Error::parse(format!(
                        "`{name}`: {e}"
                    ))
                })?;
        let input = inputs.single().map_err(|e| {
            element_utils::Error::parse(format!("`{name}`: {e}"))
        })?;
        let out = ElementParser::file(input).map_err(|e| {
            element_utils::Error::parse(format!("`{name}`: {e}"))
        })?;
        log::info!(
            "Parsed `{name}` in {}ms",
            time.elapsed().as_millis()
        );
        Ok(out)
    }

    /// Parse a single expression, used for compiling targets given as text.
    pub fn parse_expression(text: &str) -> ElementResult<Expression> {
        let user_data = UserData {
            file: Id::new("<expression>"),
        };
        let inputs = ElementParser::parse_with_userdata(
            Rule::expression_input,
            text,
            user_data,
        )
        .map_err(|e| element_utils::Error::parse(format!("`{text}`: {e}")))?;
        let input = inputs.single().map_err(|e| {
            element_utils::Error::parse(format!("`{text}`: {e}"))
        })?;
        ElementParser::expression_input(input)
            .map_err(|e| element_utils::Error::parse(format!("`{text}`: {e}")))
    }

    fn get_span(node: &Node) -> Span {
        let (line, column) = node.as_span().start_pos().line_col();
        Span::new(node.user_data().file, line, column)
    }
}

#[pest_consume::parser]
impl ElementParser {
    fn EOI(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn intrinsic_kw(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn struct_kw(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn namespace_kw(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn constraint_kw(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn terminal(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    // ================ Literals =====================
    fn identifier(input: Node) -> ParseResult<Id> {
        Ok(Id::new(input.as_str()))
    }

    fn literal(input: Node) -> ParseResult<f32> {
        input
            .as_str()
            .parse::<f32>()
            .map_err(|_| input.error("Expected a number"))
    }

    // ================ Expressions =====================
    fn atom(input: Node) -> ParseResult<Expression> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [literal(value)] => Expression::Literal { value, span },
            [identifier(name)] => Expression::Identifier { name, span },
        ))
    }

    fn call_args(input: Node) -> ParseResult<Vec<Expression>> {
        Ok(match_nodes!(
            input.into_children();
            [expression(args)..] => args.collect(),
        ))
    }

    fn member(input: Node) -> ParseResult<Id> {
        Ok(match_nodes!(
            input.into_children();
            [identifier(name)] => name,
        ))
    }

    fn suffix(input: Node) -> ParseResult<Suffix> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [call_args(args)] => Suffix::Call(args, span),
            [member(name)] => Suffix::Member(name, span),
        ))
    }

    fn expression(input: Node) -> ParseResult<Expression> {
        Ok(match_nodes!(
            input.into_children();
            [atom(head), suffix(suffixes)..] => {
                suffixes.fold(head, |target, suffix| match suffix {
                    Suffix::Call(args, span) => Expression::Call {
                        callee: Box::new(target),
                        args,
                        span,
                    },
                    Suffix::Member(member, span) => Expression::Index {
                        target: Box::new(target),
                        member,
                        span,
                    },
                })
            },
        ))
    }

    fn expression_input(input: Node) -> ParseResult<Expression> {
        Ok(match_nodes!(
            input.into_children();
            [expression(e), EOI(_)] => e,
        ))
    }

    // ================ Declarations =====================
    fn type_name(input: Node) -> ParseResult<Expression> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [identifier(head), identifier(rest)..] => {
                rest.fold(Expression::Identifier { name: head, span }, |target, member| {
                    Expression::Index {
                        target: Box::new(target),
                        member,
                        span,
                    }
                })
            },
        ))
    }

    fn port(input: Node) -> ParseResult<PortDef> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [identifier(name), type_name(constraint)] => PortDef {
                name,
                constraint: Some(constraint),
                span,
            },
            [identifier(name)] => PortDef {
                name,
                constraint: None,
                span,
            },
        ))
    }

    fn port_list(input: Node) -> ParseResult<Vec<PortDef>> {
        Ok(match_nodes!(
            input.into_children();
            [port(ports)..] => ports.collect(),
        ))
    }

    fn qualifier(input: Node) -> ParseResult<bool> {
        Ok(match_nodes!(
            input.into_children();
            [intrinsic_kw(_)] => true,
            [] => false,
        ))
    }

    fn ports(input: Node) -> ParseResult<Option<Vec<PortDef>>> {
        Ok(match_nodes!(
            input.into_children();
            [port_list(ports)] => Some(ports),
            [] => None,
        ))
    }

    fn declared_type(input: Node) -> ParseResult<Option<Expression>> {
        Ok(match_nodes!(
            input.into_children();
            [type_name(ty)] => Some(ty),
            [] => None,
        ))
    }

    fn scope(input: Node) -> ParseResult<Vec<Declaration>> {
        Ok(match_nodes!(
            input.into_children();
            [item(items)..] => items.collect(),
        ))
    }

    fn expression_body(input: Node) -> ParseResult<Expression> {
        Ok(match_nodes!(
            input.into_children();
            [expression(e)] => e,
        ))
    }

    fn struct_body(input: Node) -> ParseResult<Body> {
        Ok(match_nodes!(
            input.into_children();
            [scope(items)] => Body::Scope(items),
            [terminal(_)] => Body::Terminal,
        ))
    }

    fn function_body(input: Node) -> ParseResult<Body> {
        Ok(match_nodes!(
            input.into_children();
            [scope(items)] => Body::Scope(items),
            [expression_body(e)] => Body::Expression(e),
            [terminal(_)] => Body::Terminal,
        ))
    }

    fn namespace_decl(input: Node) -> ParseResult<Declaration> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [namespace_kw(_), identifier(name), scope(items)] => Declaration {
                kind: DeclKind::Namespace,
                intrinsic: false,
                name,
                ports: None,
                declared_type: None,
                body: Body::Scope(items),
                span,
            },
        ))
    }

    fn struct_decl(input: Node) -> ParseResult<Declaration> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [qualifier(intrinsic), struct_kw(_), identifier(name), ports(ports), declared_type(declared_type), struct_body(body)] => Declaration {
                kind: DeclKind::Struct,
                intrinsic,
                name,
                ports,
                declared_type,
                body,
                span,
            },
        ))
    }

    fn constraint_decl(input: Node) -> ParseResult<Declaration> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [qualifier(intrinsic), constraint_kw(_), identifier(name), ports(ports), declared_type(declared_type), terminal(_)] => Declaration {
                kind: DeclKind::Constraint,
                intrinsic,
                name,
                ports,
                declared_type,
                body: Body::Terminal,
                span,
            },
        ))
    }

    fn function_decl(input: Node) -> ParseResult<Declaration> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [qualifier(intrinsic), identifier(name), ports(ports), declared_type(declared_type), function_body(body)] => Declaration {
                kind: DeclKind::Function,
                intrinsic,
                name,
                ports,
                declared_type,
                body,
                span,
            },
        ))
    }

    fn item(input: Node) -> ParseResult<Declaration> {
        Ok(match_nodes!(
            input.into_children();
            [namespace_decl(decl)] => decl,
            [struct_decl(decl)] => decl,
            [constraint_decl(decl)] => decl,
            [function_decl(decl)] => decl,
        ))
    }

    fn declarations(input: Node) -> ParseResult<Vec<Declaration>> {
        Ok(match_nodes!(
            input.into_children();
            [item(items)..] => items.collect(),
        ))
    }

    fn file(input: Node) -> ParseResult<ast::SourceFile> {
        let name = input.user_data().file;
        Ok(match_nodes!(
            input.into_children();
            [declarations(items), EOI(_)] => ast::SourceFile { name, items },
        ))
    }
}
