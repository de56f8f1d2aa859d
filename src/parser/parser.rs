//! Recursive descent parser producing the arena-backed AST.
//!
//! Syntax errors abort the member (or top-level declaration) being parsed:
//! the error is reported to the unit's diagnostic sink, the parser skips to
//! the end of that member and carries on with the next one.

use super::error::ParseError;
use super::lexer::{Lexer, LexicalToken, Token};
use crate::ast::*;
use crate::consts::PARSER_MAX_GAS;
use crate::diagnostics::{DiagnosticKind, DiagnosticSink};

type PResult<T> = std::result::Result<T, ParseError>;

pub struct Parser<'d> {
    tokens: Vec<LexicalToken>,
    current: usize,
    arena: DeclArena,
    next_expr_id: u32,
    gas: usize,
    eof: Location,
    sink: &'d mut DiagnosticSink,
}

impl<'d> Parser<'d> {
    pub fn new(source: &str, sink: &'d mut DiagnosticSink) -> Self {
        let (tokens, bad) = Lexer::new(source).tokenize();
        for b in bad {
            sink.report(DiagnosticKind::DeleteToken(b.text), b.span);
        }
        let eof = tokens.last().map(|t| t.end).unwrap_or_default();
        Self { tokens, current: 0, arena: DeclArena::new(), next_expr_id: 0, gas: 0, eof, sink }
    }

    /// Parse the whole unit. Never fails; problems end up in the sink.
    pub fn parse_unit(mut self) -> CompilationUnit {
        let start = self.start();

        let mut package = None;
        if self.check(&Token::Package) {
            match self.parse_package_decl() {
                Ok(name) => package = Some(name),
                Err(e) => {
                    self.report(e);
                    self.skip_past(&Token::Semicolon);
                }
            }
        }

        let mut imports = Vec::new();
        while self.check(&Token::Import) {
            match self.parse_import_decl() {
                Ok(import) => imports.push(import),
                Err(e) => {
                    self.report(e);
                    self.skip_past(&Token::Semicolon);
                }
            }
        }

        while !self.is_at_end() {
            if self.match_token(&Token::Semicolon) {
                continue;
            }
            let before = self.current;
            match self.parse_type_decl(None) {
                Ok(_) => {}
                Err(ParseError::TooComplex) => {
                    self.report(ParseError::TooComplex);
                    break;
                }
                Err(e) => {
                    self.report(e);
                    self.recover_member(before);
                    if self.current == before {
                        // stray `}` at top level
                        self.advance();
                    }
                }
            }
        }

        let span = Span::new(start, self.eof);
        CompilationUnit::new(package, imports, self.arena, span, self.next_expr_id)
    }

    // ----- token helpers -----

    fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len()
    }

    fn kind(&self) -> Option<&Token> {
        self.tokens.get(self.current).map(|t| &t.token)
    }

    fn kind_at(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.current + n).map(|t| &t.token)
    }

    fn check(&self, token_type: &Token) -> bool {
        self.kind() == Some(token_type)
    }

    fn check_at(&self, n: usize, token_type: &Token) -> bool {
        self.kind_at(n) == Some(token_type)
    }

    fn check_ident(&self, text: &str) -> bool {
        self.check_ident_at(0, text)
    }

    fn check_ident_at(&self, n: usize, text: &str) -> bool {
        matches!(self.tokens.get(self.current + n), Some(t) if t.token == Token::Identifier && t.lexeme == text)
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.current += 1;
        }
    }

    fn match_token(&mut self, token_type: &Token) -> bool {
        if self.check(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token_type: &Token, what: &str) -> PResult<Span> {
        if self.check(token_type) {
            let span = self.peek_span();
            self.advance();
            Ok(span)
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.tokens.get(self.current) {
            Some(tok) => ParseError::unexpected_token(expected, &tok.lexeme, tok.span()),
            None => ParseError::UnexpectedEndOfInput { expected: expected.to_string(), location: self.eof },
        }
    }

    fn peek_span(&self) -> Span {
        self.tokens.get(self.current).map(|t| t.span()).unwrap_or_else(|| Span::new(self.eof, self.eof))
    }

    fn lexeme(&self) -> &str {
        self.tokens.get(self.current).map(|t| t.lexeme.as_str()).unwrap_or("")
    }

    fn start(&self) -> Location {
        self.peek_span().start
    }

    fn prev_end(&self) -> Location {
        if self.current == 0 {
            self.start()
        } else {
            self.tokens[self.current - 1].end
        }
    }

    fn span_from(&self, start: Location) -> Span {
        Span::new(start, self.prev_end())
    }

    fn step(&mut self) -> PResult<()> {
        self.gas += 1;
        if self.gas > PARSER_MAX_GAS {
            Err(ParseError::TooComplex)
        } else {
            Ok(())
        }
    }

    fn report(&mut self, error: ParseError) {
        log::debug!("syntax error: {}", error);
        let (kind, span) = error.to_diagnostic();
        self.sink.report(kind, span);
    }

    fn mk(&mut self, kind: ExprKind, span: Span) -> Expr {
        let id = ExprId(self.next_expr_id);
        self.next_expr_id += 1;
        Expr::new(id, kind, span)
    }

    fn fresh_id(&mut self) -> ExprId {
        let id = ExprId(self.next_expr_id);
        self.next_expr_id += 1;
        id
    }

    fn ident(&mut self) -> PResult<(String, Span)> {
        if self.check(&Token::Identifier) {
            let tok = &self.tokens[self.current];
            let result = (tok.lexeme.clone(), tok.span());
            self.advance();
            Ok(result)
        } else {
            Err(self.unexpected("identifier"))
        }
    }

    fn qualified_name(&mut self) -> PResult<String> {
        let (mut name, _) = self.ident()?;
        while self.check(&Token::Dot) && self.check_at(1, &Token::Identifier) {
            self.advance();
            let (part, _) = self.ident()?;
            name.push('.');
            name.push_str(&part);
        }
        Ok(name)
    }

    /// Consume one `>` out of `>`, `>>` or `>>>`.
    fn expect_gt(&mut self) -> PResult<()> {
        match self.kind() {
            Some(Token::Gt) => {
                self.advance();
                Ok(())
            }
            Some(Token::RShift) => {
                self.split_first_char(Token::Gt);
                Ok(())
            }
            Some(Token::URShift) => {
                self.split_first_char(Token::RShift);
                Ok(())
            }
            Some(Token::Ge) => {
                self.split_first_char(Token::Assign);
                Ok(())
            }
            _ => Err(self.unexpected(">")),
        }
    }

    fn split_first_char(&mut self, rest: Token) {
        let tok = &mut self.tokens[self.current];
        tok.token = rest;
        tok.lexeme.remove(0);
        tok.location.column += 1;
        tok.location.offset += 1;
    }

    fn skip_past(&mut self, token_type: &Token) {
        while !self.is_at_end() {
            let done = self.check(token_type);
            self.advance();
            if done {
                break;
            }
        }
    }

    /// Skip the member that started at token index `start`: up to the first
    /// `;` or balanced `{...}` at its own nesting level.
    fn recover_member(&mut self, start: usize) {
        self.current = start;
        let mut depth = 0usize;
        while let Some(kind) = self.kind() {
            match kind {
                Token::Semicolon if depth == 0 => {
                    self.advance();
                    break;
                }
                Token::LBrace => depth += 1,
                Token::RBrace => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        break;
                    }
                }
                _ => {}
            }
            self.advance();
        }
        if self.current == start && !self.is_at_end() && !self.check(&Token::RBrace) {
            self.advance();
        }
    }

    // ----- package / imports -----

    fn parse_package_decl(&mut self) -> PResult<String> {
        self.expect(&Token::Package, "package")?;
        let name = self.qualified_name()?;
        self.expect(&Token::Semicolon, ";")?;
        Ok(name)
    }

    fn parse_import_decl(&mut self) -> PResult<ImportDecl> {
        let start = self.start();
        self.expect(&Token::Import, "import")?;
        let is_static = self.match_token(&Token::Static);
        let (mut name, _) = self.ident()?;
        let mut is_wildcard = false;
        while self.match_token(&Token::Dot) {
            if self.match_token(&Token::Star) {
                is_wildcard = true;
                break;
            }
            let (part, _) = self.ident()?;
            name.push('.');
            name.push_str(&part);
        }
        self.expect(&Token::Semicolon, ";")?;
        Ok(ImportDecl { name, is_static, is_wildcard, span: self.span_from(start) })
    }

    // ----- modifiers and annotations -----

    fn modifier_here(&self) -> Option<Modifier> {
        let m = match self.kind()? {
            Token::Public => Modifier::Public,
            Token::Protected => Modifier::Protected,
            Token::Private => Modifier::Private,
            Token::Static => Modifier::Static,
            Token::Abstract => Modifier::Abstract,
            Token::Final => Modifier::Final,
            Token::Native => Modifier::Native,
            Token::Synchronized => Modifier::Synchronized,
            Token::Transient => Modifier::Transient,
            Token::Volatile => Modifier::Volatile,
            Token::Strictfp => Modifier::Strictfp,
            Token::NonSealed => Modifier::NonSealed,
            Token::Default if !self.check_at(1, &Token::Colon) && !self.check_at(1, &Token::Arrow) => {
                Modifier::Default
            }
            Token::Identifier if self.check_ident("sealed") => {
                let next_is_decl_start = match self.kind_at(1) {
                    Some(k) => {
                        k.is_modifier()
                            || matches!(k, Token::Class | Token::Interface | Token::At)
                            || self.check_ident_at(1, "record")
                            || self.check_ident_at(1, "sealed")
                    }
                    None => false,
                };
                if !next_is_decl_start {
                    return None;
                }
                Modifier::Sealed
            }
            _ => return None,
        };
        Some(m)
    }

    fn parse_modifiers(&mut self) -> PResult<(Vec<Annotation>, Modifiers)> {
        let mut annotations = Vec::new();
        let mut modifiers = Modifiers::default();
        loop {
            self.step()?;
            if self.check(&Token::At) && !self.check_at(1, &Token::Interface) {
                annotations.push(self.parse_annotation()?);
                continue;
            }
            if let Some(m) = self.modifier_here() {
                let span = self.peek_span();
                modifiers.push(m, span);
                self.advance();
                continue;
            }
            break;
        }
        Ok((annotations, modifiers))
    }

    fn parse_annotation(&mut self) -> PResult<Annotation> {
        let start = self.start();
        self.expect(&Token::At, "@")?;
        let name = self.qualified_name()?;
        let mut elements = Vec::new();
        if self.match_token(&Token::LParen) {
            if !self.check(&Token::RParen) {
                if self.check(&Token::Identifier) && self.check_at(1, &Token::Assign) {
                    loop {
                        let (key, _) = self.ident()?;
                        self.expect(&Token::Assign, "=")?;
                        let value = self.parse_element_value()?;
                        elements.push((key, value));
                        if !self.match_token(&Token::Comma) {
                            break;
                        }
                    }
                } else {
                    let value = self.parse_element_value()?;
                    elements.push(("value".to_string(), value));
                }
            }
            self.expect(&Token::RParen, ")")?;
        }
        Ok(Annotation { name, elements, span: self.span_from(start) })
    }

    fn parse_element_value(&mut self) -> PResult<ElementValue> {
        let start = self.start();
        if self.match_token(&Token::LBrace) {
            let mut values = Vec::new();
            while !self.check(&Token::RBrace) {
                self.step()?;
                values.push(self.parse_element_value()?);
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::RBrace, "}")?;
            return Ok(ElementValue::Array(values, self.span_from(start)));
        }
        if self.check(&Token::At) {
            return Ok(ElementValue::Annotation(Box::new(self.parse_annotation()?)));
        }
        Ok(ElementValue::Expr(self.parse_conditional()?))
    }

    // ----- types -----

    fn parse_type(&mut self) -> PResult<TypeRef> {
        let start = self.start();
        let mut annotations = Vec::new();
        while self.check(&Token::At) {
            annotations.push(self.parse_annotation()?);
        }
        let mut type_args = Vec::new();
        let name = match self.kind() {
            Some(k) if k.is_primitive_type() => {
                let name = self.lexeme().to_string();
                self.advance();
                name
            }
            Some(Token::Identifier) => {
                let (mut name, _) = self.ident()?;
                if self.check(&Token::Lt) {
                    type_args = self.parse_type_args()?;
                }
                while self.check(&Token::Dot) && self.check_at(1, &Token::Identifier) {
                    self.advance();
                    let (part, _) = self.ident()?;
                    name.push('.');
                    name.push_str(&part);
                    if self.check(&Token::Lt) {
                        type_args = self.parse_type_args()?;
                    }
                }
                name
            }
            Some(Token::Question) => {
                self.advance();
                if self.match_token(&Token::Extends) || self.match_token(&Token::Super) {
                    type_args.push(self.parse_type()?);
                }
                "?".to_string()
            }
            _ => return Err(self.unexpected("type")),
        };
        let mut array_dims = 0;
        while self.check(&Token::LBracket) && self.check_at(1, &Token::RBracket) {
            self.advance();
            self.advance();
            array_dims += 1;
        }
        Ok(TypeRef { name, type_args, array_dims, annotations, span: self.span_from(start) })
    }

    fn parse_type_args(&mut self) -> PResult<Vec<TypeRef>> {
        self.expect(&Token::Lt, "<")?;
        let mut args = Vec::new();
        if self.check(&Token::Gt) {
            self.advance();
            return Ok(args);
        }
        loop {
            self.step()?;
            args.push(self.parse_type()?);
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.expect_gt()?;
        Ok(args)
    }

    fn parse_type_params(&mut self) -> PResult<Vec<TypeParam>> {
        self.expect(&Token::Lt, "<")?;
        let mut params = Vec::new();
        loop {
            self.step()?;
            let start = self.start();
            let (name, _) = self.ident()?;
            let mut bounds = Vec::new();
            if self.match_token(&Token::Extends) {
                bounds.push(self.parse_type()?);
                while self.match_token(&Token::Amp) {
                    bounds.push(self.parse_type()?);
                }
            }
            params.push(TypeParam { name, bounds, span: self.span_from(start) });
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.expect_gt()?;
        Ok(params)
    }

    fn parse_type_list(&mut self) -> PResult<Vec<TypeRef>> {
        let mut types = vec![self.parse_type()?];
        while self.match_token(&Token::Comma) {
            types.push(self.parse_type()?);
        }
        Ok(types)
    }

    /// Index just past a type starting at token `i`, without consuming.
    fn scan_type(&self, mut i: usize) -> Option<usize> {
        let tok = self.tokens.get(i)?;
        if tok.token.is_primitive_type() {
            i += 1;
        } else if tok.token == Token::Identifier {
            i += 1;
            loop {
                match self.tokens.get(i).map(|t| &t.token) {
                    Some(Token::Dot) if matches!(self.tokens.get(i + 1).map(|t| &t.token), Some(Token::Identifier)) => {
                        i += 2;
                    }
                    Some(Token::Lt) => {
                        let mut depth: i32 = 0;
                        loop {
                            match self.tokens.get(i).map(|t| &t.token)? {
                                Token::Lt => depth += 1,
                                Token::Gt => depth -= 1,
                                Token::RShift => depth -= 2,
                                Token::URShift => depth -= 3,
                                Token::Identifier
                                | Token::Comma
                                | Token::Dot
                                | Token::Question
                                | Token::Extends
                                | Token::Super
                                | Token::Amp
                                | Token::LBracket
                                | Token::RBracket => {}
                                t if t.is_primitive_type() => {}
                                _ => return None,
                            }
                            i += 1;
                            if depth <= 0 {
                                break;
                            }
                        }
                        if depth < 0 {
                            return None;
                        }
                    }
                    _ => break,
                }
            }
        } else {
            return None;
        }
        while matches!(self.tokens.get(i).map(|t| &t.token), Some(Token::LBracket))
            && matches!(self.tokens.get(i + 1).map(|t| &t.token), Some(Token::RBracket))
        {
            i += 2;
        }
        Some(i)
    }

    // ----- type declarations -----

    fn at_type_decl_keyword(&self) -> bool {
        matches!(self.kind(), Some(Token::Class | Token::Interface | Token::Enum))
            || (self.check(&Token::At) && self.check_at(1, &Token::Interface))
            || (self.check_ident("record")
                && self.check_at(1, &Token::Identifier)
                && (self.check_at(2, &Token::LParen) || self.check_at(2, &Token::Lt)))
    }

    fn parse_type_decl(&mut self, enclosing: Option<DeclId>) -> PResult<DeclId> {
        let start = self.start();
        let (annotations, modifiers) = self.parse_modifiers()?;
        self.parse_type_decl_rest(start, annotations, modifiers, enclosing)
    }

    fn parse_type_decl_rest(
        &mut self,
        start: Location,
        annotations: Vec<Annotation>,
        modifiers: Modifiers,
        enclosing: Option<DeclId>,
    ) -> PResult<DeclId> {
        let kind = match self.kind() {
            Some(Token::Class) => TypeKind::Class,
            Some(Token::Interface) => TypeKind::Interface,
            Some(Token::Enum) => TypeKind::Enum,
            Some(Token::At) => {
                self.advance();
                TypeKind::Annotation
            }
            Some(Token::Identifier) if self.check_ident("record") => TypeKind::Record,
            _ => return Err(self.unexpected("class, interface, enum or record")),
        };
        self.advance();
        let (name, name_span) = self.ident()?;
        let mut decl = TypeDecl::new(kind, name, name_span, name_span);
        decl.modifiers = modifiers;
        decl.annotations = annotations;
        decl.enclosing = enclosing;

        if self.check(&Token::Lt) {
            decl.type_params = self.parse_type_params()?;
        }
        if kind == TypeKind::Record {
            decl.components = self.parse_record_header()?;
        }
        if self.check(&Token::Extends) {
            let extends_span = self.peek_span();
            self.advance();
            match kind {
                TypeKind::Class => decl.extends = Some(self.parse_type()?),
                TypeKind::Interface => decl.implements = self.parse_type_list()?,
                TypeKind::Record | TypeKind::Enum | TypeKind::Annotation => {
                    self.sink.report(
                        DiagnosticKind::InvalidSyntax(format!("a {} cannot have an extends clause", kind)),
                        extends_span,
                    );
                    self.parse_type_list()?;
                }
            }
        }
        if self.match_token(&Token::Implements) {
            decl.implements = self.parse_type_list()?;
        }
        if self.check_ident("permits") {
            self.advance();
            decl.permits = self.parse_type_list()?;
        }

        let id = self.arena.alloc(decl);
        if let Some(outer) = enclosing {
            self.arena[outer].nested.push(id);
        }
        self.parse_type_body(id)?;
        self.arena[id].span = self.span_from(start);
        Ok(id)
    }

    fn parse_record_header(&mut self) -> PResult<Vec<RecordComponent>> {
        self.expect(&Token::LParen, "(")?;
        let mut components = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                self.step()?;
                let start = self.start();
                let (annotations, modifiers) = self.parse_modifiers()?;
                let ty = self.parse_type()?;
                let varargs = self.match_token(&Token::Ellipsis);
                let (name, name_span) = self.ident()?;
                let extra_dims = self.parse_extra_dims();
                components.push(RecordComponent {
                    annotations,
                    modifiers,
                    ty,
                    varargs,
                    name,
                    name_span,
                    extra_dims,
                    span: self.span_from(start),
                });
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen, ")")?;
        Ok(components)
    }

    fn parse_extra_dims(&mut self) -> usize {
        let mut dims = 0;
        while self.check(&Token::LBracket) && self.check_at(1, &Token::RBracket) {
            self.advance();
            self.advance();
            dims += 1;
        }
        dims
    }

    fn parse_type_body(&mut self, id: DeclId) -> PResult<()> {
        self.expect(&Token::LBrace, "{")?;
        if self.arena[id].kind == TypeKind::Enum {
            self.parse_enum_constants(id)?;
        }
        while !self.check(&Token::RBrace) && !self.is_at_end() {
            self.step()?;
            if self.match_token(&Token::Semicolon) {
                continue;
            }
            let before = self.current;
            match self.parse_member(id) {
                Ok(Some(member)) => self.arena[id].members.push(member),
                Ok(None) => {}
                Err(ParseError::TooComplex) => return Err(ParseError::TooComplex),
                Err(e) => {
                    self.report(e);
                    self.recover_member(before);
                }
            }
        }
        self.expect(&Token::RBrace, "}")?;
        Ok(())
    }

    fn parse_enum_constants(&mut self, id: DeclId) -> PResult<()> {
        while !self.check(&Token::Semicolon) && !self.check(&Token::RBrace) {
            self.step()?;
            let start = self.start();
            let mut annotations = Vec::new();
            while self.check(&Token::At) {
                annotations.push(self.parse_annotation()?);
            }
            let (name, name_span) = self.ident()?;
            let args = if self.check(&Token::LParen) { self.parse_arguments()? } else { Vec::new() };
            if self.check(&Token::LBrace) {
                return Err(ParseError::unsupported("enum constant bodies", self.peek_span()));
            }
            let span = self.span_from(start);
            self.arena[id].enum_constants.push(EnumConstant { annotations, name, name_span, args, span });
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.match_token(&Token::Semicolon);
        Ok(())
    }

    fn parse_member(&mut self, owner: DeclId) -> PResult<Option<Member>> {
        let start = self.start();
        if self.check(&Token::LBrace) {
            let body = self.parse_block()?;
            return Ok(Some(Member::Initializer(Initializer { is_static: false, body, span: self.span_from(start) })));
        }
        if self.check(&Token::Static) && self.check_at(1, &Token::LBrace) {
            self.advance();
            let body = self.parse_block()?;
            return Ok(Some(Member::Initializer(Initializer { is_static: true, body, span: self.span_from(start) })));
        }

        let (annotations, modifiers) = self.parse_modifiers()?;
        if self.at_type_decl_keyword() {
            self.parse_type_decl_rest(start, annotations, modifiers, Some(owner))?;
            return Ok(None);
        }

        let type_params = if self.check(&Token::Lt) { self.parse_type_params()? } else { Vec::new() };

        let owner_name = self.arena[owner].name.clone();
        let owner_kind = self.arena[owner].kind;
        if self.check(&Token::Identifier) && self.lexeme() == owner_name {
            if self.check_at(1, &Token::LParen) {
                return Ok(Some(Member::Constructor(self.parse_constructor(start, annotations, modifiers, type_params)?)));
            }
            if self.check_at(1, &Token::LBrace) && owner_kind == TypeKind::Record {
                return Ok(Some(Member::Constructor(self.parse_compact_constructor(
                    start,
                    annotations,
                    modifiers,
                    type_params,
                )?)));
            }
        }

        let ty = self.parse_type()?;
        let (name, name_span) = self.ident()?;
        if self.check(&Token::LParen) {
            return Ok(Some(Member::Method(self.parse_method_rest(
                start,
                annotations,
                modifiers,
                type_params,
                ty,
                name,
                name_span,
                owner_kind,
            )?)));
        }

        let declarators = self.parse_declarators_after_name(name, name_span)?;
        self.expect(&Token::Semicolon, ";")?;
        Ok(Some(Member::Field(FieldDecl {
            modifiers,
            annotations,
            ty,
            declarators,
            origin: Origin::Source,
            span: self.span_from(start),
        })))
    }

    #[allow(clippy::too_many_arguments)]
    fn parse_method_rest(
        &mut self,
        start: Location,
        annotations: Vec<Annotation>,
        modifiers: Modifiers,
        type_params: Vec<TypeParam>,
        return_type: TypeRef,
        name: String,
        name_span: Span,
        owner_kind: TypeKind,
    ) -> PResult<MethodDecl> {
        let params = self.parse_parameters()?;
        let dims = self.parse_extra_dims();
        let return_type = return_type.with_extra_dims(dims);
        let throws = if self.match_token(&Token::Throws) { self.parse_type_list()? } else { Vec::new() };
        let mut default_value = None;
        if owner_kind == TypeKind::Annotation && self.match_token(&Token::Default) {
            default_value = Some(self.parse_element_value()?);
        }
        let body = if self.match_token(&Token::Semicolon) { None } else { Some(self.parse_block()?) };
        Ok(MethodDecl {
            modifiers,
            annotations,
            type_params,
            return_type,
            name,
            name_span,
            params,
            throws,
            body,
            default_value,
            origin: Origin::Source,
            object_method: None,
            span: self.span_from(start),
        })
    }

    fn parse_constructor(
        &mut self,
        start: Location,
        annotations: Vec<Annotation>,
        modifiers: Modifiers,
        type_params: Vec<TypeParam>,
    ) -> PResult<ConstructorDecl> {
        let (name, name_span) = self.ident()?;
        let params = self.parse_parameters()?;
        let throws = if self.match_token(&Token::Throws) { self.parse_type_list()? } else { Vec::new() };
        let body = self.parse_block()?;
        Ok(ConstructorDecl {
            modifiers,
            annotations,
            type_params,
            name,
            name_span,
            params,
            compact: false,
            throws,
            body,
            origin: Origin::Source,
            span: self.span_from(start),
        })
    }

    fn parse_compact_constructor(
        &mut self,
        start: Location,
        annotations: Vec<Annotation>,
        modifiers: Modifiers,
        type_params: Vec<TypeParam>,
    ) -> PResult<ConstructorDecl> {
        let (name, name_span) = self.ident()?;
        let body = self.parse_block()?;
        Ok(ConstructorDecl {
            modifiers,
            annotations,
            type_params,
            name,
            name_span,
            params: Vec::new(),
            compact: true,
            throws: Vec::new(),
            body,
            origin: Origin::Source,
            span: self.span_from(start),
        })
    }

    fn parse_parameters(&mut self) -> PResult<Vec<Parameter>> {
        self.expect(&Token::LParen, "(")?;
        let mut params = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                self.step()?;
                let start = self.start();
                let (annotations, modifiers) = self.parse_modifiers()?;
                let ty = self.parse_type()?;
                let varargs = self.match_token(&Token::Ellipsis);
                let (name, name_span) = self.ident()?;
                let extra_dims = self.parse_extra_dims();
                params.push(Parameter {
                    annotations,
                    modifiers,
                    ty,
                    varargs,
                    name,
                    name_span,
                    extra_dims,
                    span: self.span_from(start),
                });
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen, ")")?;
        Ok(params)
    }

    fn parse_declarators_after_name(&mut self, name: String, name_span: Span) -> PResult<Vec<VarDeclarator>> {
        let mut declarators = vec![self.parse_declarator_rest(name, name_span)?];
        while self.match_token(&Token::Comma) {
            let (name, name_span) = self.ident()?;
            declarators.push(self.parse_declarator_rest(name, name_span)?);
        }
        Ok(declarators)
    }

    fn parse_declarator_rest(&mut self, name: String, name_span: Span) -> PResult<VarDeclarator> {
        let extra_dims = self.parse_extra_dims();
        let init = if self.match_token(&Token::Assign) { Some(self.parse_var_init()?) } else { None };
        Ok(VarDeclarator { name, name_span, extra_dims, init, span: self.span_from(name_span.start) })
    }

    fn parse_var_init(&mut self) -> PResult<Expr> {
        if self.check(&Token::LBrace) {
            self.parse_array_init()
        } else {
            self.parse_expression()
        }
    }

    fn parse_array_init(&mut self) -> PResult<Expr> {
        let start = self.start();
        self.expect(&Token::LBrace, "{")?;
        let mut elems = Vec::new();
        while !self.check(&Token::RBrace) {
            self.step()?;
            elems.push(self.parse_var_init()?);
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RBrace, "}")?;
        let span = self.span_from(start);
        Ok(self.mk(ExprKind::ArrayInit(elems), span))
    }

    // ----- statements -----

    fn parse_block(&mut self) -> PResult<Block> {
        let start = self.start();
        self.expect(&Token::LBrace, "{")?;
        let mut stmts = Vec::new();
        while !self.check(&Token::RBrace) {
            self.step()?;
            if self.is_at_end() {
                return Err(self.unexpected("}"));
            }
            stmts.push(self.parse_block_stmt()?);
        }
        self.expect(&Token::RBrace, "}")?;
        Ok(Block { stmts, span: self.span_from(start) })
    }

    fn parse_block_stmt(&mut self) -> PResult<Stmt> {
        if self.at_type_decl_keyword()
            || ((self.check(&Token::Final) || self.check(&Token::Abstract) || self.check(&Token::Static))
                && matches!(self.kind_at(1), Some(Token::Class | Token::Interface | Token::Enum)))
        {
            return Err(ParseError::unsupported("local type declarations", self.peek_span()));
        }
        if self.is_local_var_decl() {
            let stmt = self.parse_local_var_decl()?;
            self.expect(&Token::Semicolon, ";")?;
            return Ok(stmt);
        }
        self.parse_statement()
    }

    fn is_local_var_decl(&self) -> bool {
        match self.kind() {
            Some(Token::Final) | Some(Token::At) => true,
            Some(k) if k.is_primitive_type() && *k != Token::Void => !self.check_at(1, &Token::Dot),
            Some(Token::Identifier) => {
                if self.check_ident("yield") {
                    return false;
                }
                if self.check_ident("var") && self.check_at(1, &Token::Identifier) {
                    return true;
                }
                match self.scan_type(self.current) {
                    Some(i) => {
                        matches!(self.tokens.get(i).map(|t| &t.token), Some(Token::Identifier))
                            && matches!(
                                self.tokens.get(i + 1).map(|t| &t.token),
                                Some(Token::Assign | Token::Semicolon | Token::Comma | Token::LBracket | Token::Colon)
                            )
                    }
                    None => false,
                }
            }
            _ => false,
        }
    }

    fn parse_local_var_decl(&mut self) -> PResult<Stmt> {
        let start = self.start();
        let (_annotations, modifiers) = self.parse_modifiers()?;
        let ty = self.parse_type()?;
        let (name, name_span) = self.ident()?;
        if self.check(&Token::Colon) {
            return Err(ParseError::unsupported("enhanced for loops", self.peek_span()));
        }
        let declarators = self.parse_declarators_after_name(name, name_span)?;
        Ok(Stmt::LocalVar(LocalVarStmt { modifiers, ty, declarators, span: self.span_from(start) }))
    }

    fn parse_statement(&mut self) -> PResult<Stmt> {
        let start = self.start();
        match self.kind() {
            Some(Token::LBrace) => Ok(Stmt::Block(self.parse_block()?)),
            Some(Token::Semicolon) => {
                self.advance();
                Ok(Stmt::Empty(self.span_from(start)))
            }
            Some(Token::If) => self.parse_if_stmt(),
            Some(Token::While) => self.parse_while_stmt(),
            Some(Token::Do) => self.parse_do_while_stmt(),
            Some(Token::For) => self.parse_for_stmt(),
            Some(Token::Return) => {
                self.advance();
                let value = if self.check(&Token::Semicolon) { None } else { Some(self.parse_expression()?) };
                self.expect(&Token::Semicolon, ";")?;
                Ok(Stmt::Return(ReturnStmt { value, span: self.span_from(start) }))
            }
            Some(Token::Break) => {
                self.advance();
                let label = self.parse_jump_label()?;
                self.expect(&Token::Semicolon, ";")?;
                Ok(Stmt::Break(BreakStmt { label, span: self.span_from(start) }))
            }
            Some(Token::Continue) => {
                self.advance();
                let label = self.parse_jump_label()?;
                self.expect(&Token::Semicolon, ";")?;
                Ok(Stmt::Continue(ContinueStmt { label, span: self.span_from(start) }))
            }
            Some(Token::Throw) => Ok(Stmt::Throw(self.parse_throw_stmt()?)),
            Some(Token::Try) => self.parse_try_stmt(),
            Some(Token::Synchronized) => {
                self.advance();
                self.expect(&Token::LParen, "(")?;
                let lock = self.parse_expression()?;
                self.expect(&Token::RParen, ")")?;
                let body = self.parse_block()?;
                Ok(Stmt::Synchronized(SynchronizedStmt { lock, body, span: self.span_from(start) }))
            }
            Some(Token::Switch) => {
                self.advance();
                let selector = self.parse_paren_expr()?;
                let cases = self.parse_switch_body()?;
                Ok(Stmt::Switch(SwitchStmt { selector, cases, span: self.span_from(start) }))
            }
            Some(Token::Assert) => Err(ParseError::unsupported("assert statements", self.peek_span())),
            Some(Token::This) | Some(Token::Super) if self.check_at(1, &Token::LParen) => {
                let kind = if self.check(&Token::This) { CtorCallKind::This } else { CtorCallKind::Super };
                self.advance();
                let args = self.parse_arguments()?;
                self.expect(&Token::Semicolon, ";")?;
                let id = self.fresh_id();
                Ok(Stmt::ExplicitCtorCall(ExplicitCtorCall { id, kind, args, span: self.span_from(start) }))
            }
            Some(Token::Identifier) if self.check_ident("yield") && self.is_yield_statement() => {
                self.advance();
                let value = self.parse_expression()?;
                self.expect(&Token::Semicolon, ";")?;
                Ok(Stmt::Yield(YieldStmt { value, span: self.span_from(start) }))
            }
            Some(Token::Identifier) if self.check_at(1, &Token::Colon) => {
                let (label, _) = self.ident()?;
                self.advance();
                let body = self.parse_statement()?;
                Ok(Stmt::Labeled(LabeledStmt { label, body: Box::new(body), span: self.span_from(start) }))
            }
            _ => {
                let expr = self.parse_expression()?;
                if !matches!(
                    expr.kind,
                    ExprKind::Assign { .. } | ExprKind::IncDec { .. } | ExprKind::MethodCall { .. } | ExprKind::New { .. }
                ) {
                    return Err(ParseError::invalid_syntax("not a statement", expr.span));
                }
                self.expect(&Token::Semicolon, ";")?;
                Ok(Stmt::Expression(ExprStmt { expr, span: self.span_from(start) }))
            }
        }
    }

    /// `break`/`continue` take an optional label; anything else before the
    /// `;` (notably `break 1;`) is a syntax error.
    fn parse_jump_label(&mut self) -> PResult<Option<String>> {
        match self.kind() {
            Some(Token::Identifier) => Ok(Some(self.ident()?.0)),
            Some(Token::Semicolon) | None => Ok(None),
            Some(_) => {
                let tok = &self.tokens[self.current];
                Err(ParseError::DeleteToken { token: tok.lexeme.clone(), span: tok.span() })
            }
        }
    }

    /// `yield` starts a statement unless the token after it makes it an
    /// ordinary identifier: `yield = 1`, `yield.f()`, `yield()`, `yield(a, b)`.
    fn is_yield_statement(&self) -> bool {
        match self.kind_at(1) {
            None => false,
            Some(Token::LParen) => {
                let mut i = self.current + 2;
                let mut depth = 1;
                let mut has_comma = false;
                let mut empty = true;
                while let Some(tok) = self.tokens.get(i) {
                    match tok.token {
                        Token::LParen => depth += 1,
                        Token::RParen => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        Token::Comma if depth == 1 => has_comma = true,
                        _ => {}
                    }
                    empty = false;
                    i += 1;
                }
                !empty && !has_comma
            }
            Some(k) => {
                k.is_literal()
                    || k.is_primitive_type()
                    || matches!(
                        k,
                        Token::Identifier
                            | Token::New
                            | Token::Switch
                            | Token::This
                            | Token::Super
                            | Token::Bang
                            | Token::Tilde
                            | Token::Plus
                            | Token::Minus
                            | Token::Inc
                            | Token::Dec
                            | Token::Semicolon
                    )
            }
        }
    }

    fn parse_throw_stmt(&mut self) -> PResult<ThrowStmt> {
        let start = self.start();
        self.expect(&Token::Throw, "throw")?;
        let expr = self.parse_expression()?;
        self.expect(&Token::Semicolon, ";")?;
        Ok(ThrowStmt { expr, span: self.span_from(start) })
    }

    fn parse_paren_expr(&mut self) -> PResult<Expr> {
        self.expect(&Token::LParen, "(")?;
        let expr = self.parse_expression()?;
        self.expect(&Token::RParen, ")")?;
        Ok(expr)
    }

    fn parse_if_stmt(&mut self) -> PResult<Stmt> {
        let start = self.start();
        self.expect(&Token::If, "if")?;
        let cond = self.parse_paren_expr()?;
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.match_token(&Token::Else) { Some(Box::new(self.parse_statement()?)) } else { None };
        Ok(Stmt::If(IfStmt { cond, then_branch, else_branch, span: self.span_from(start) }))
    }

    fn parse_while_stmt(&mut self) -> PResult<Stmt> {
        let start = self.start();
        self.expect(&Token::While, "while")?;
        let cond = self.parse_paren_expr()?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::While(WhileStmt { cond, body, span: self.span_from(start) }))
    }

    fn parse_do_while_stmt(&mut self) -> PResult<Stmt> {
        let start = self.start();
        self.expect(&Token::Do, "do")?;
        let body = Box::new(self.parse_statement()?);
        self.expect(&Token::While, "while")?;
        let cond = self.parse_paren_expr()?;
        self.expect(&Token::Semicolon, ";")?;
        Ok(Stmt::DoWhile(DoWhileStmt { body, cond, span: self.span_from(start) }))
    }

    fn parse_for_stmt(&mut self) -> PResult<Stmt> {
        let start = self.start();
        self.expect(&Token::For, "for")?;
        self.expect(&Token::LParen, "(")?;
        let mut init = Vec::new();
        if !self.check(&Token::Semicolon) {
            if self.is_local_var_decl() {
                init.push(self.parse_local_var_decl()?);
            } else {
                loop {
                    let expr = self.parse_expression()?;
                    let span = expr.span;
                    init.push(Stmt::Expression(ExprStmt { expr, span }));
                    if !self.match_token(&Token::Comma) {
                        break;
                    }
                }
            }
        }
        self.expect(&Token::Semicolon, ";")?;
        let cond = if self.check(&Token::Semicolon) { None } else { Some(self.parse_expression()?) };
        self.expect(&Token::Semicolon, ";")?;
        let mut update = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                update.push(self.parse_expression()?);
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen, ")")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::For(ForStmt { init, cond, update, body, span: self.span_from(start) }))
    }

    fn parse_try_stmt(&mut self) -> PResult<Stmt> {
        let start = self.start();
        self.expect(&Token::Try, "try")?;
        if self.check(&Token::LParen) {
            return Err(ParseError::unsupported("try-with-resources", self.peek_span()));
        }
        let body = self.parse_block()?;
        let mut catches = Vec::new();
        while self.check(&Token::Catch) {
            let catch_start = self.start();
            self.advance();
            self.expect(&Token::LParen, "(")?;
            self.parse_modifiers()?;
            let mut types = vec![self.parse_type()?];
            while self.match_token(&Token::Pipe) {
                types.push(self.parse_type()?);
            }
            let (name, name_span) = self.ident()?;
            self.expect(&Token::RParen, ")")?;
            let block = self.parse_block()?;
            catches.push(CatchClause { types, name, name_span, body: block, span: self.span_from(catch_start) });
        }
        let finally = if self.match_token(&Token::Finally) { Some(self.parse_block()?) } else { None };
        if catches.is_empty() && finally.is_none() {
            return Err(ParseError::invalid_syntax("insert \"Finally\" to complete TryStatement", self.span_from(start)));
        }
        Ok(Stmt::Try(TryStmt { body, catches, finally, span: self.span_from(start) }))
    }

    fn parse_switch_body(&mut self) -> PResult<Vec<SwitchCase>> {
        self.expect(&Token::LBrace, "{")?;
        let mut cases = Vec::new();
        while !self.check(&Token::RBrace) {
            self.step()?;
            let start = self.start();
            let labels = self.parse_case_labels()?;
            let body = if self.match_token(&Token::Arrow) {
                CaseBody::Arrow(self.parse_arrow_body()?)
            } else {
                self.expect(&Token::Colon, ": or ->")?;
                let mut stmts = Vec::new();
                while !matches!(self.kind(), Some(Token::Case | Token::Default | Token::RBrace) | None) {
                    self.step()?;
                    stmts.push(self.parse_block_stmt()?);
                }
                CaseBody::Colon(stmts)
            };
            cases.push(SwitchCase { labels, body, span: self.span_from(start) });
        }
        self.expect(&Token::RBrace, "}")?;
        Ok(cases)
    }

    fn parse_case_labels(&mut self) -> PResult<Vec<CaseLabel>> {
        if self.check(&Token::Default) {
            let span = self.peek_span();
            self.advance();
            return Ok(vec![CaseLabel::Default(span)]);
        }
        self.expect(&Token::Case, "case or default")?;
        let mut labels = Vec::new();
        loop {
            if self.check(&Token::Default) {
                labels.push(CaseLabel::Default(self.peek_span()));
                self.advance();
            } else {
                labels.push(CaseLabel::Expr(self.parse_conditional()?));
            }
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        Ok(labels)
    }

    fn parse_arrow_body(&mut self) -> PResult<ArrowBody> {
        match self.kind() {
            Some(Token::LBrace) => Ok(ArrowBody::Block(self.parse_block()?)),
            Some(Token::Throw) => Ok(ArrowBody::Throw(self.parse_throw_stmt()?)),
            _ => {
                let expr = self.parse_expression()?;
                self.expect(&Token::Semicolon, ";")?;
                Ok(ArrowBody::Expr(expr))
            }
        }
    }

    // ----- expressions -----

    fn parse_expression(&mut self) -> PResult<Expr> {
        self.step()?;
        self.parse_assignment()
    }

    fn assign_op(&self) -> Option<Option<BinaryOp>> {
        let op = match self.kind()? {
            Token::Assign => None,
            Token::AddAssign => Some(BinaryOp::Add),
            Token::SubAssign => Some(BinaryOp::Sub),
            Token::MulAssign => Some(BinaryOp::Mul),
            Token::DivAssign => Some(BinaryOp::Div),
            Token::ModAssign => Some(BinaryOp::Rem),
            Token::AndAssign => Some(BinaryOp::BitAnd),
            Token::OrAssign => Some(BinaryOp::BitOr),
            Token::XorAssign => Some(BinaryOp::BitXor),
            Token::LShiftAssign => Some(BinaryOp::Shl),
            Token::RShiftAssign => Some(BinaryOp::Shr),
            Token::URShiftAssign => Some(BinaryOp::UShr),
            _ => return None,
        };
        Some(op)
    }

    fn parse_assignment(&mut self) -> PResult<Expr> {
        if self.is_lambda_start() {
            return self.parse_lambda();
        }
        let start = self.start();
        let target = self.parse_conditional()?;
        if let Some(op) = self.assign_op() {
            if !matches!(
                target.unparenthesized().kind,
                ExprKind::Name(_) | ExprKind::FieldAccess { .. } | ExprKind::ArrayAccess { .. }
            ) {
                return Err(ParseError::invalid_syntax("invalid assignment target", target.span));
            }
            self.advance();
            let value = self.parse_assignment()?;
            let span = self.span_from(start);
            return Ok(self.mk(ExprKind::Assign { op, target: Box::new(target), value: Box::new(value) }, span));
        }
        if self.check(&Token::Arrow) {
            return Err(ParseError::invalid_syntax("invalid lambda parameters", target.span));
        }
        Ok(target)
    }

    /// `x ->` or a parenthesized list whose closing `)` is followed by `->`.
    fn is_lambda_start(&self) -> bool {
        match self.kind() {
            Some(Token::Identifier) => self.check_at(1, &Token::Arrow),
            Some(Token::LParen) => {
                let mut depth = 0usize;
                for (i, tok) in self.tokens[self.current..].iter().enumerate() {
                    match tok.token {
                        Token::LParen => depth += 1,
                        Token::RParen => {
                            depth -= 1;
                            if depth == 0 {
                                return self.check_at(i + 1, &Token::Arrow);
                            }
                        }
                        Token::Semicolon | Token::LBrace | Token::RBrace => return false,
                        _ => {}
                    }
                }
                false
            }
            _ => false,
        }
    }

    fn parse_lambda(&mut self) -> PResult<Expr> {
        let start = self.start();
        let mut params = Vec::new();
        if self.check(&Token::Identifier) {
            let (name, name_span) = self.ident()?;
            params.push(LambdaParam { ty: None, name, name_span });
        } else {
            self.expect(&Token::LParen, "(")?;
            while !self.check(&Token::RParen) {
                self.step()?;
                let implicit =
                    self.check(&Token::Identifier) && matches!(self.kind_at(1), Some(Token::Comma | Token::RParen));
                let ty = if implicit {
                    None
                } else {
                    self.parse_modifiers()?;
                    let ty = self.parse_type()?;
                    (!(ty.name == "var" && ty.array_dims == 0)).then_some(ty)
                };
                let (name, name_span) = self.ident()?;
                params.push(LambdaParam { ty, name, name_span });
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::RParen, ")")?;
        }
        self.expect(&Token::Arrow, "->")?;
        let body = if self.check(&Token::LBrace) {
            LambdaBody::Block(self.parse_block()?)
        } else {
            LambdaBody::Expr(Box::new(self.parse_expression()?))
        };
        let span = self.span_from(start);
        Ok(self.mk(ExprKind::Lambda(Box::new(LambdaExpr { params, body })), span))
    }

    fn parse_conditional(&mut self) -> PResult<Expr> {
        let start = self.start();
        let cond = self.parse_binary(1)?;
        if self.match_token(&Token::Question) {
            let then_expr = self.parse_expression()?;
            self.expect(&Token::Colon, ":")?;
            let else_expr = self.parse_conditional()?;
            let span = self.span_from(start);
            return Ok(self.mk(
                ExprKind::Conditional {
                    cond: Box::new(cond),
                    then_expr: Box::new(then_expr),
                    else_expr: Box::new(else_expr),
                },
                span,
            ));
        }
        Ok(cond)
    }

    fn binary_op(&self) -> Option<(BinaryOp, u8)> {
        let op = match self.kind()? {
            Token::PipePipe => (BinaryOp::Or, 1),
            Token::AndAnd => (BinaryOp::And, 2),
            Token::Pipe => (BinaryOp::BitOr, 3),
            Token::Caret => (BinaryOp::BitXor, 4),
            Token::Amp => (BinaryOp::BitAnd, 5),
            Token::Eq => (BinaryOp::Eq, 6),
            Token::Ne => (BinaryOp::Ne, 6),
            Token::Lt => (BinaryOp::Lt, 7),
            Token::Gt => (BinaryOp::Gt, 7),
            Token::Le => (BinaryOp::Le, 7),
            Token::Ge => (BinaryOp::Ge, 7),
            Token::LShift => (BinaryOp::Shl, 8),
            Token::RShift => (BinaryOp::Shr, 8),
            Token::URShift => (BinaryOp::UShr, 8),
            Token::Plus => (BinaryOp::Add, 9),
            Token::Minus => (BinaryOp::Sub, 9),
            Token::Star => (BinaryOp::Mul, 10),
            Token::Slash => (BinaryOp::Div, 10),
            Token::Percent => (BinaryOp::Rem, 10),
            _ => return None,
        };
        Some(op)
    }

    fn parse_binary(&mut self, min_prec: u8) -> PResult<Expr> {
        let start = self.start();
        let mut left = self.parse_unary()?;
        loop {
            self.step()?;
            if self.check(&Token::InstanceOf) && min_prec <= 7 {
                self.advance();
                let ty = self.parse_type()?;
                if self.check(&Token::Identifier) {
                    return Err(ParseError::unsupported("pattern matching for instanceof", self.peek_span()));
                }
                let span = self.span_from(start);
                left = self.mk(ExprKind::InstanceOf { expr: Box::new(left), ty }, span);
                continue;
            }
            let Some((op, prec)) = self.binary_op() else { break };
            if prec < min_prec {
                break;
            }
            self.advance();
            let right = self.parse_binary(prec + 1)?;
            let span = self.span_from(start);
            left = self.mk(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) }, span);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let start = self.start();
        let op = match self.kind() {
            Some(Token::Minus) => Some(UnaryOp::Neg),
            Some(Token::Plus) => Some(UnaryOp::Plus),
            Some(Token::Bang) => Some(UnaryOp::Not),
            Some(Token::Tilde) => Some(UnaryOp::BitNot),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            let span = self.span_from(start);
            return Ok(self.mk(ExprKind::Unary { op, operand: Box::new(operand) }, span));
        }
        if self.check(&Token::Inc) || self.check(&Token::Dec) {
            let increment = self.check(&Token::Inc);
            self.advance();
            let target = self.parse_unary()?;
            let span = self.span_from(start);
            return Ok(self.mk(ExprKind::IncDec { increment, prefix: true, target: Box::new(target) }, span));
        }
        if self.check(&Token::LParen) && self.is_cast() {
            self.advance();
            let ty = self.parse_type()?;
            self.expect(&Token::RParen, ")")?;
            let expr = if self.is_lambda_start() { self.parse_lambda()? } else { self.parse_unary()? };
            let span = self.span_from(start);
            return Ok(self.mk(ExprKind::Cast { ty, expr: Box::new(expr) }, span));
        }
        self.parse_postfix()
    }

    fn is_cast(&self) -> bool {
        let Some(next) = self.kind_at(1) else { return false };
        let primitive = next.is_primitive_type();
        if !primitive && *next != Token::Identifier {
            return false;
        }
        let Some(end) = self.scan_type(self.current + 1) else { return false };
        if !matches!(self.tokens.get(end).map(|t| &t.token), Some(Token::RParen)) {
            return false;
        }
        if primitive {
            return true;
        }
        match self.tokens.get(end + 1).map(|t| &t.token) {
            Some(k) => {
                k.is_literal()
                    || matches!(
                        k,
                        Token::Identifier
                            | Token::LParen
                            | Token::Bang
                            | Token::Tilde
                            | Token::This
                            | Token::Super
                            | Token::New
                            | Token::Switch
                    )
            }
            None => false,
        }
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let start = self.start();
        let mut expr = self.parse_primary()?;
        loop {
            self.step()?;
            match self.kind() {
                Some(Token::Dot) => {
                    self.advance();
                    match self.kind() {
                        Some(Token::Class) => {
                            self.advance();
                            let ty = self.expr_as_type(&expr)?;
                            let span = self.span_from(start);
                            expr = self.mk(ExprKind::ClassLit(ty), span);
                        }
                        Some(Token::New) => {
                            return Err(ParseError::unsupported("qualified instance creation", self.peek_span()))
                        }
                        Some(Token::This) => {
                            return Err(ParseError::unsupported("qualified this", self.peek_span()))
                        }
                        Some(Token::Lt) => {
                            return Err(ParseError::unsupported("explicit type arguments", self.peek_span()))
                        }
                        _ => {
                            let (name, name_span) = self.ident()?;
                            if self.check(&Token::LParen) {
                                let args = self.parse_arguments()?;
                                let span = self.span_from(start);
                                expr = self.mk(
                                    ExprKind::MethodCall { target: Some(Box::new(expr)), name, name_span, args },
                                    span,
                                );
                            } else {
                                let span = self.span_from(start);
                                expr = self.mk(ExprKind::FieldAccess { target: Box::new(expr), name, name_span }, span);
                            }
                        }
                    }
                }
                Some(Token::LBracket) => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(&Token::RBracket, "]")?;
                    let span = self.span_from(start);
                    expr = self.mk(ExprKind::ArrayAccess { array: Box::new(expr), index: Box::new(index) }, span);
                }
                Some(Token::Inc) | Some(Token::Dec) => {
                    let increment = self.check(&Token::Inc);
                    self.advance();
                    let span = self.span_from(start);
                    expr = self.mk(ExprKind::IncDec { increment, prefix: false, target: Box::new(expr) }, span);
                }
                Some(Token::DoubleColon) => {
                    return Err(ParseError::unsupported("method references", self.peek_span()));
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn expr_as_type(&self, expr: &Expr) -> PResult<TypeRef> {
        fn name_of(expr: &Expr) -> Option<String> {
            match &expr.kind {
                ExprKind::Name(n) => Some(n.clone()),
                ExprKind::FieldAccess { target, name, .. } => name_of(target).map(|t| format!("{}.{}", t, name)),
                _ => None,
            }
        }
        match name_of(expr) {
            Some(name) => Ok(TypeRef::named(&name, expr.span)),
            None => Err(ParseError::invalid_syntax("class literal needs a type name", expr.span)),
        }
    }

    fn parse_arguments(&mut self) -> PResult<Vec<Expr>> {
        self.expect(&Token::LParen, "(")?;
        let mut args = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen, ")")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let start = self.start();
        let span = self.peek_span();
        let Some(kind) = self.kind().cloned() else {
            return Err(self.unexpected("expression"));
        };
        match kind {
            Token::IntLiteral
            | Token::LongLiteral
            | Token::FloatLiteral
            | Token::CharLiteral
            | Token::StringLiteral
            | Token::True
            | Token::False
            | Token::Null => {
                let literal = self.parse_literal()?;
                self.advance();
                Ok(self.mk(ExprKind::Literal(literal), span))
            }
            Token::This => {
                self.advance();
                Ok(self.mk(ExprKind::This, span))
            }
            Token::Super => {
                self.advance();
                if !self.check(&Token::Dot) {
                    return Err(self.unexpected("."));
                }
                Ok(self.mk(ExprKind::Super, span))
            }
            Token::Identifier => {
                let (name, name_span) = self.ident()?;
                if self.check(&Token::LParen) {
                    let args = self.parse_arguments()?;
                    let span = self.span_from(start);
                    Ok(self.mk(ExprKind::MethodCall { target: None, name, name_span, args }, span))
                } else {
                    Ok(self.mk(ExprKind::Name(name), name_span))
                }
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&Token::RParen, ")")?;
                let span = self.span_from(start);
                Ok(self.mk(ExprKind::Parenthesized(Box::new(inner)), span))
            }
            Token::New => self.parse_new_expression(),
            Token::Switch => {
                self.advance();
                let selector = self.parse_paren_expr()?;
                let cases = self.parse_switch_body()?;
                let span = self.span_from(start);
                Ok(self.mk(ExprKind::Switch(Box::new(SwitchExpr { selector, cases })), span))
            }
            k if k.is_primitive_type() => {
                let ty = self.parse_type()?;
                self.expect(&Token::Dot, ".")?;
                self.expect(&Token::Class, "class")?;
                let span = self.span_from(start);
                Ok(self.mk(ExprKind::ClassLit(ty), span))
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_new_expression(&mut self) -> PResult<Expr> {
        let start = self.start();
        self.expect(&Token::New, "new")?;
        let type_start = self.start();
        let name = match self.kind() {
            Some(k) if k.is_primitive_type() && *k != Token::Void => {
                let name = self.lexeme().to_string();
                self.advance();
                name
            }
            Some(Token::Identifier) => self.qualified_name()?,
            _ => return Err(self.unexpected("type")),
        };
        let mut type_args = Vec::new();
        if self.check(&Token::Lt) {
            type_args = self.parse_type_args()?;
        }
        let ty = TypeRef { name, type_args, array_dims: 0, annotations: Vec::new(), span: self.span_from(type_start) };

        if self.check(&Token::LBracket) {
            let mut dims = Vec::new();
            let mut extra_dims = 0;
            while self.check(&Token::LBracket) {
                self.advance();
                if self.match_token(&Token::RBracket) {
                    extra_dims += 1;
                } else {
                    if extra_dims > 0 {
                        return Err(self.unexpected("]"));
                    }
                    dims.push(self.parse_expression()?);
                    self.expect(&Token::RBracket, "]")?;
                }
            }
            let init = if dims.is_empty() {
                let init = self.parse_array_init()?;
                match init.kind {
                    ExprKind::ArrayInit(elems) => Some(elems),
                    _ => None,
                }
            } else {
                None
            };
            let span = self.span_from(start);
            return Ok(self.mk(ExprKind::NewArray { elem: ty, dims, extra_dims, init }, span));
        }

        let args = self.parse_arguments()?;
        if self.check(&Token::LBrace) {
            return Err(ParseError::unsupported("anonymous classes", self.peek_span()));
        }
        let span = self.span_from(start);
        Ok(self.mk(ExprKind::New { ty, args }, span))
    }

    fn parse_literal(&self) -> PResult<Literal> {
        let tok = &self.tokens[self.current];
        let text = tok.lexeme.as_str();
        let bad = || ParseError::invalid_syntax(&format!("the literal {} is out of range", text), tok.span());
        let literal = match tok.token {
            Token::True => Literal::Bool(true),
            Token::False => Literal::Bool(false),
            Token::Null => Literal::Null,
            Token::IntLiteral => {
                let value = parse_integer(text).ok_or_else(bad)?;
                let decimal = !text.starts_with('0') || text == "0";
                if (decimal && value > 1 << 31) || value > u64::from(u32::MAX) {
                    return Err(bad());
                }
                Literal::Int(value as u32 as i32)
            }
            Token::LongLiteral => {
                let digits = &text[..text.len() - 1];
                let value = parse_integer(digits).ok_or_else(bad)?;
                Literal::Long(value as i64)
            }
            Token::FloatLiteral => {
                let cleaned: String = text.chars().filter(|c| *c != '_').collect();
                match cleaned.chars().last() {
                    Some('f') | Some('F') => {
                        Literal::Float(cleaned[..cleaned.len() - 1].parse::<f32>().map_err(|_| bad())?)
                    }
                    Some('d') | Some('D') => {
                        Literal::Double(cleaned[..cleaned.len() - 1].parse::<f64>().map_err(|_| bad())?)
                    }
                    _ => Literal::Double(cleaned.parse::<f64>().map_err(|_| bad())?),
                }
            }
            Token::CharLiteral => {
                let units = unescape(&text[1..text.len() - 1]).ok_or_else(bad)?;
                if units.len() != 1 {
                    return Err(bad());
                }
                Literal::Char(units[0])
            }
            Token::StringLiteral => {
                let units = unescape(&text[1..text.len() - 1]).ok_or_else(bad)?;
                Literal::String(String::from_utf16_lossy(&units))
            }
            _ => return Err(self.unexpected("literal")),
        };
        Ok(literal)
    }
}

fn parse_integer(text: &str) -> Option<u64> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    if let Some(hex) = cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = cleaned.strip_prefix("0b").or_else(|| cleaned.strip_prefix("0B")) {
        u64::from_str_radix(bin, 2).ok()
    } else if cleaned.len() > 1 && cleaned.starts_with('0') {
        u64::from_str_radix(&cleaned[1..], 8).ok()
    } else {
        cleaned.parse::<u64>().ok()
    }
}

/// Decode Java escapes into UTF-16 code units.
fn unescape(body: &str) -> Option<Vec<u16>> {
    let mut out = Vec::new();
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u16; 2];
            out.extend_from_slice(c.encode_utf16(&mut buf));
            continue;
        }
        let esc = chars.next()?;
        let unit = match esc {
            'n' => 0x0A,
            't' => 0x09,
            'b' => 0x08,
            'r' => 0x0D,
            'f' => 0x0C,
            's' => 0x20,
            '\'' => 0x27,
            '"' => 0x22,
            '\\' => 0x5C,
            'u' => {
                while chars.peek() == Some(&'u') {
                    chars.next();
                }
                let hex: String = (0..4).filter_map(|_| chars.next()).collect();
                u16::from_str_radix(&hex, 16).ok()?
            }
            '0'..='7' => {
                let mut value = esc.to_digit(8)?;
                let max_digits = if esc <= '3' { 2 } else { 1 };
                for _ in 0..max_digits {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(d) => {
                            value = value * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                value as u16
            }
            _ => return None,
        };
        out.push(unit);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> CompilationUnit {
        let mut sink = DiagnosticSink::new();
        let unit = Parser::new(source, &mut sink).parse_unit();
        assert!(sink.is_empty(), "unexpected diagnostics: {:?}", sink.iter().collect::<Vec<_>>());
        unit
    }

    #[test]
    fn unescape_handles_java_escapes() {
        assert_eq!(unescape(r"a\nA\101"), Some(vec![0x61, 0x0A, 0x41, 0x41]));
        assert_eq!(unescape(r"\q"), None);
    }

    #[test]
    fn integer_radixes() {
        assert_eq!(parse_integer("0x1F"), Some(31));
        assert_eq!(parse_integer("0b101"), Some(5));
        assert_eq!(parse_integer("017"), Some(15));
        assert_eq!(parse_integer("1_000"), Some(1000));
    }

    #[test]
    fn nested_generic_closers_split() {
        let unit = parse_ok("class A { java.util.Map<String, java.util.List<String>> m; }");
        let decl = unit.decls.top_level().next().unwrap();
        let field = decl.fields().next().unwrap();
        assert_eq!(field.ty.type_args.len(), 2);
        assert_eq!(field.ty.type_args[1].type_args.len(), 1);
    }

    #[test]
    fn casts_and_parenthesized_expressions() {
        let unit = parse_ok("class A { int m(int a) { int b = (int) 2.0; return (a) + b; } }");
        let decl = unit.decls.top_level().next().unwrap();
        let method = decl.methods().next().unwrap();
        let body = method.body.as_ref().unwrap();
        match &body.stmts[0] {
            Stmt::LocalVar(v) => assert!(matches!(v.declarators[0].init.as_ref().unwrap().kind, ExprKind::Cast { .. })),
            other => panic!("expected local var, got {:?}", other),
        }
        match &body.stmts[1] {
            Stmt::Return(r) => assert!(matches!(r.value.as_ref().unwrap().kind, ExprKind::Binary { .. })),
            other => panic!("expected return, got {:?}", other),
        }
    }

    #[test]
    fn yield_used_as_a_variable_is_an_expression() {
        let unit = parse_ok("class A { void m() { int yield = 0; yield = 2; } }");
        let decl = unit.decls.top_level().next().unwrap();
        let body = decl.methods().next().unwrap().body.as_ref().unwrap();
        assert!(matches!(body.stmts[1], Stmt::Expression(_)));
    }
}
