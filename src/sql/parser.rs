//! SQL Parser
//!
//! This module parses SQL tokens into an AST. The grammar is a small,
//! hand-written recursive descent over the token stream produced by the
//! [`Lexer`].

use super::ast::*;
use super::lexer::Lexer;
use super::token::{Spanned, Token};
use crate::catalog::FieldType;
use crate::error::{Error, Result};

/// SQL Parser
pub struct Parser {
    tokens: Vec<Spanned>,
    position: usize,
}

impl Parser {
    /// Create a new parser from a SQL string
    pub fn new(sql: &str) -> Result<Self> {
        let mut lexer = Lexer::new(sql);
        let tokens = lexer.tokenize()?;

        Ok(Self {
            tokens,
            position: 0,
        })
    }

    /// Parse exactly one statement. A trailing `;` is allowed, anything
    /// after it is an error.
    pub fn parse(&mut self) -> Result<Statement> {
        if self.is_at_end() || (self.check(&Token::Semicolon) && self.peek_is_eof()) {
            return Err(Error::EmptyStatement);
        }

        let stmt = self.parse_statement()?;

        if self.check(&Token::Semicolon) {
            self.advance();
        }

        if !self.is_at_end() {
            return Err(self.unexpected("end of statement"));
        }

        Ok(stmt)
    }

    /// Parse a single statement
    fn parse_statement(&mut self) -> Result<Statement> {
        match self.current() {
            Token::Select => self.parse_select().map(Statement::Select),
            Token::Insert => self.parse_insert().map(Statement::Insert),
            Token::Update => self.parse_update().map(Statement::Update),
            Token::Delete => self.parse_delete().map(Statement::Delete),
            Token::Create => self.parse_create(),
            Token::Alter => self.parse_alter().map(Statement::AlterTable),
            Token::Drop => self.parse_drop(),
            Token::Rename => self.parse_rename(),
            Token::Grant => self.parse_grant(),
            Token::Revoke => self.parse_revoke(),
            Token::Begin => self.parse_begin(),
            Token::Commit => self.parse_commit(),
            Token::Rollback => self.parse_rollback(),
            _ => Err(self.unexpected(
                "SELECT, INSERT, UPDATE, DELETE, CREATE, ALTER, DROP, RENAME, GRANT, REVOKE, BEGIN, COMMIT, or ROLLBACK",
            )),
        }
    }

    // ========== SELECT Statement ==========

    fn parse_select(&mut self) -> Result<SelectStatement> {
        self.expect(&Token::Select)?;

        let columns = self.parse_select_list()?;

        self.expect(&Token::From)?;
        let from = self.parse_from_clause()?;

        let where_clause = if self.check(&Token::Where) {
            self.advance();
            Some(self.parse_condition()?)
        } else {
            None
        };

        let mut group_by = Vec::new();
        if self.check(&Token::Group) {
            self.advance();
            self.expect(&Token::By)?;
            group_by.push(self.parse_column_ref()?);
            while self.check(&Token::Comma) {
                self.advance();
                group_by.push(self.parse_column_ref()?);
            }
        }

        let order_by = if self.check(&Token::Order) {
            self.advance();
            self.expect(&Token::By)?;
            self.parse_order_by_list()?
        } else {
            Vec::new()
        };

        Ok(SelectStatement {
            columns,
            from,
            where_clause,
            group_by,
            order_by,
        })
    }

    fn parse_select_list(&mut self) -> Result<Vec<SelectItem>> {
        let mut items = vec![self.parse_select_item()?];

        while self.check(&Token::Comma) {
            self.advance();
            items.push(self.parse_select_item()?);
        }

        Ok(items)
    }

    fn parse_select_item(&mut self) -> Result<SelectItem> {
        if self.check(&Token::Asterisk) {
            self.advance();
            return Ok(SelectItem::Wildcard);
        }

        let expr = if self.check(&Token::LParen) && self.peek() == Some(&Token::Select) {
            SelectExpr::Subquery(Box::new(self.parse_subquery()?))
        } else if let Some(func) = self.aggregate_func() {
            self.advance();
            self.expect(&Token::LParen)?;
            let arg = if self.check(&Token::Asterisk) {
                self.advance();
                AggregateArg::Star
            } else {
                AggregateArg::Column(self.parse_column_ref()?)
            };
            self.expect(&Token::RParen)?;
            SelectExpr::Aggregate { func, arg }
        } else {
            SelectExpr::Column(self.parse_column_ref()?)
        };

        let alias = self.parse_optional_alias()?;

        Ok(SelectItem::Expr { expr, alias })
    }

    fn aggregate_func(&self) -> Option<AggregateFunc> {
        match self.current() {
            Token::Count => Some(AggregateFunc::Count),
            Token::Sum => Some(AggregateFunc::Sum),
            Token::Avg => Some(AggregateFunc::Avg),
            Token::Max => Some(AggregateFunc::Max),
            Token::Min => Some(AggregateFunc::Min),
            _ => None,
        }
    }

    /// `AS name` or a bare identifier
    fn parse_optional_alias(&mut self) -> Result<Option<String>> {
        if self.check(&Token::As) {
            self.advance();
            return self.expect_identifier().map(Some);
        }

        if let Token::Identifier(name) = self.current().clone() {
            self.advance();
            return Ok(Some(name));
        }

        Ok(None)
    }

    /// `( SELECT ... )`
    fn parse_subquery(&mut self) -> Result<SelectStatement> {
        self.expect(&Token::LParen)?;
        let query = self.parse_select()?;
        self.expect(&Token::RParen)?;
        Ok(query)
    }

    fn parse_from_clause(&mut self) -> Result<FromClause> {
        let mut from = FromClause {
            tables: vec![self.parse_table_ref()?],
            joins: Vec::new(),
        };

        loop {
            if self.check(&Token::Comma) {
                self.advance();
                from.tables.push(self.parse_table_ref()?);
            } else if self.is_join_keyword() {
                let join_type = self.parse_join_type()?;
                from.tables.push(self.parse_table_ref()?);
                self.expect(&Token::On)?;

                let left = self.parse_column_ref()?;
                if !self.check(&Token::Eq) {
                    return Err(Error::ParseError(format!(
                        "JOIN condition only supports '=', found '{}'",
                        self.current()
                    )));
                }
                self.advance();
                let right = self.parse_column_ref()?;

                from.joins.push(JoinClause {
                    join_type,
                    table_index: from.tables.len() - 1,
                    left,
                    right,
                });
            } else {
                break;
            }
        }

        Ok(from)
    }

    fn parse_table_ref(&mut self) -> Result<TableRef> {
        let name = self.expect_identifier()?;
        let alias = self.parse_optional_alias()?;
        Ok(TableRef { name, alias })
    }

    fn is_join_keyword(&self) -> bool {
        matches!(
            self.current(),
            Token::Join | Token::Inner | Token::Left | Token::Right
        )
    }

    fn parse_join_type(&mut self) -> Result<JoinType> {
        let join_type = match self.current() {
            Token::Inner => {
                self.advance();
                JoinType::Inner
            }
            Token::Left => {
                self.advance();
                JoinType::Left
            }
            Token::Right => {
                self.advance();
                JoinType::Right
            }
            _ => JoinType::Inner,
        };

        self.expect(&Token::Join)?;
        Ok(join_type)
    }

    fn parse_order_by_list(&mut self) -> Result<Vec<OrderByItem>> {
        let mut items = Vec::new();

        loop {
            let column = self.parse_column_ref()?;
            let ascending = match self.current() {
                Token::Asc => {
                    self.advance();
                    true
                }
                Token::Desc => {
                    self.advance();
                    false
                }
                _ => true,
            };
            items.push(OrderByItem { column, ascending });

            if !self.check(&Token::Comma) {
                break;
            }
            self.advance();
        }

        Ok(items)
    }

    /// `name` or `qualifier.name`
    fn parse_column_ref(&mut self) -> Result<ColumnRef> {
        let first = self.expect_identifier()?;

        if self.check(&Token::Dot) {
            self.advance();
            let column = self.expect_identifier()?;
            Ok(ColumnRef::qualified(first, column))
        } else {
            Ok(ColumnRef::new(first))
        }
    }

    // ========== WHERE Conditions ==========

    fn parse_condition(&mut self) -> Result<Condition> {
        self.parse_or_condition()
    }

    fn parse_or_condition(&mut self) -> Result<Condition> {
        let mut left = self.parse_and_condition()?;

        while self.check(&Token::Or) {
            self.advance();
            let right = self.parse_and_condition()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    fn parse_and_condition(&mut self) -> Result<Condition> {
        let mut left = self.parse_primary_condition()?;

        while self.check(&Token::And) {
            self.advance();
            let right = self.parse_primary_condition()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    fn parse_primary_condition(&mut self) -> Result<Condition> {
        if self.check(&Token::LParen) {
            self.advance();
            let inner = self.parse_or_condition()?;
            self.expect(&Token::RParen)?;
            return Ok(inner);
        }

        let column = self.parse_column_ref()?;

        match self.current() {
            Token::Not => {
                self.advance();
                self.expect(&Token::In)?;
                self.parse_in_subquery(column, true)
            }
            Token::In => {
                self.advance();
                self.parse_in_subquery(column, false)
            }
            Token::Like => {
                self.advance();
                match self.current().clone() {
                    Token::StringLiteral(pattern) => {
                        self.advance();
                        Ok(Condition::Like { column, pattern })
                    }
                    _ => Err(self.unexpected("string pattern")),
                }
            }
            Token::Between => {
                self.advance();
                let low = self.parse_literal()?;
                self.expect(&Token::And)?;
                let high = self.parse_literal()?;
                Ok(Condition::Between { column, low, high })
            }
            _ => {
                let op = self.parse_compare_op()?;
                let operand = self.parse_operand()?;
                Ok(Condition::Compare {
                    column,
                    op,
                    operand,
                })
            }
        }
    }

    fn parse_in_subquery(&mut self, column: ColumnRef, negated: bool) -> Result<Condition> {
        if !(self.check(&Token::LParen) && self.peek() == Some(&Token::Select)) {
            return Err(Error::ParseError(
                "IN only supports a subquery operand".to_string(),
            ));
        }

        let query = self.parse_subquery()?;
        Ok(Condition::InSubquery {
            column,
            query: Box::new(query),
            negated,
        })
    }

    fn parse_compare_op(&mut self) -> Result<CompareOp> {
        let op = match self.current() {
            Token::Eq => CompareOp::Eq,
            Token::Neq => CompareOp::NotEq,
            Token::Lt => CompareOp::Lt,
            Token::Gt => CompareOp::Gt,
            Token::Lte => CompareOp::LtEq,
            Token::Gte => CompareOp::GtEq,
            _ => return Err(self.unexpected("comparison operator")),
        };
        self.advance();
        Ok(op)
    }

    fn parse_operand(&mut self) -> Result<Operand> {
        if self.check(&Token::LParen) && self.peek() == Some(&Token::Select) {
            return Ok(Operand::Subquery(Box::new(self.parse_subquery()?)));
        }

        if matches!(self.current(), Token::Identifier(_)) {
            return Ok(Operand::Column(self.parse_column_ref()?));
        }

        self.parse_literal().map(Operand::Literal)
    }

    /// Literal value; a leading `+`/`-` is folded into the number
    fn parse_literal(&mut self) -> Result<Literal> {
        let negative = match self.current() {
            Token::Minus => {
                self.advance();
                Some(true)
            }
            Token::Plus => {
                self.advance();
                Some(false)
            }
            _ => None,
        };

        let literal = match self.current().clone() {
            Token::IntegerLiteral(n) => {
                Literal::Integer(if negative == Some(true) { -n } else { n })
            }
            Token::FloatLiteral(n) => Literal::Float(if negative == Some(true) { -n } else { n }),
            Token::StringLiteral(s) if negative.is_none() => Literal::String(s),
            Token::Null if negative.is_none() => Literal::Null,
            _ => return Err(self.unexpected("literal value")),
        };

        self.advance();
        Ok(literal)
    }

    fn parse_number(&mut self) -> Result<f64> {
        match self.parse_literal()? {
            Literal::Integer(n) => Ok(n as f64),
            Literal::Float(n) => Ok(n),
            other => Err(Error::ParseError(format!(
                "expected a number, found {}",
                other
            ))),
        }
    }

    // ========== INSERT Statement ==========

    fn parse_insert(&mut self) -> Result<InsertStatement> {
        self.expect(&Token::Insert)?;
        self.expect(&Token::Into)?;

        let table_name = self.expect_identifier()?;

        let columns = if self.check(&Token::LParen) {
            self.advance();
            let cols = self.parse_identifier_list()?;
            self.expect(&Token::RParen)?;
            Some(cols)
        } else {
            None
        };

        self.expect(&Token::Values)?;

        let mut values = vec![self.parse_value_tuple()?];
        while self.check(&Token::Comma) {
            self.advance();
            values.push(self.parse_value_tuple()?);
        }

        Ok(InsertStatement {
            table_name,
            columns,
            values,
        })
    }

    fn parse_value_tuple(&mut self) -> Result<Vec<Literal>> {
        self.expect(&Token::LParen)?;

        let mut row = vec![self.parse_literal()?];
        while self.check(&Token::Comma) {
            self.advance();
            row.push(self.parse_literal()?);
        }

        self.expect(&Token::RParen)?;
        Ok(row)
    }

    // ========== UPDATE Statement ==========

    fn parse_update(&mut self) -> Result<UpdateStatement> {
        self.expect(&Token::Update)?;
        let table_name = self.expect_identifier()?;
        self.expect(&Token::Set)?;

        let mut assignments = vec![self.parse_assignment()?];
        while self.check(&Token::Comma) {
            self.advance();
            assignments.push(self.parse_assignment()?);
        }

        let where_clause = if self.check(&Token::Where) {
            self.advance();
            Some(self.parse_condition()?)
        } else {
            None
        };

        Ok(UpdateStatement {
            table_name,
            assignments,
            where_clause,
        })
    }

    fn parse_assignment(&mut self) -> Result<Assignment> {
        let column = self.expect_identifier()?;
        self.expect(&Token::Eq)?;

        let value = if let Token::Identifier(source) = self.current().clone() {
            self.advance();
            let op = match self.current() {
                Token::Plus => ArithmeticOp::Add,
                Token::Minus => ArithmeticOp::Sub,
                Token::Asterisk => ArithmeticOp::Mul,
                Token::Slash => ArithmeticOp::Div,
                _ => return Err(self.unexpected("arithmetic operator")),
            };
            self.advance();
            SetValue::Arithmetic {
                column: source,
                op,
                operand: self.parse_number()?,
            }
        } else {
            SetValue::Literal(self.parse_literal()?)
        };

        Ok(Assignment { column, value })
    }

    // ========== DELETE Statement ==========

    fn parse_delete(&mut self) -> Result<DeleteStatement> {
        self.expect(&Token::Delete)?;
        self.expect(&Token::From)?;

        let table_name = self.expect_identifier()?;

        let where_clause = if self.check(&Token::Where) {
            self.advance();
            Some(self.parse_condition()?)
        } else {
            None
        };

        Ok(DeleteStatement {
            table_name,
            where_clause,
        })
    }

    // ========== CREATE Statement ==========

    fn parse_create(&mut self) -> Result<Statement> {
        self.expect(&Token::Create)?;

        match self.current() {
            Token::Table => self.parse_create_table().map(Statement::CreateTable),
            Token::Index => self.parse_create_index(false).map(Statement::CreateIndex),
            Token::Unique => {
                self.advance();
                self.parse_create_index(true).map(Statement::CreateIndex)
            }
            Token::User => self.parse_create_user().map(Statement::CreateUser),
            _ => Err(self.unexpected("TABLE, INDEX, UNIQUE, or USER")),
        }
    }

    fn parse_create_table(&mut self) -> Result<CreateTableStatement> {
        self.expect(&Token::Table)?;
        let table_name = self.expect_identifier()?;

        self.expect(&Token::LParen)?;

        let mut fields = vec![self.parse_field_def()?];
        while self.check(&Token::Comma) {
            self.advance();
            fields.push(self.parse_field_def()?);
        }

        self.expect(&Token::RParen)?;

        Ok(CreateTableStatement { table_name, fields })
    }

    fn parse_create_index(&mut self, unique: bool) -> Result<CreateIndexStatement> {
        self.expect(&Token::Index)?;
        let index_name = self.expect_identifier()?;

        self.expect(&Token::On)?;
        let table_name = self.expect_identifier()?;

        self.expect(&Token::LParen)?;
        let column_name = self.expect_identifier()?;
        self.expect(&Token::RParen)?;

        Ok(CreateIndexStatement {
            index_name,
            table_name,
            column_name,
            unique,
        })
    }

    fn parse_create_user(&mut self) -> Result<CreateUserStatement> {
        self.expect(&Token::User)?;
        let username = self.expect_identifier()?;

        self.expect(&Token::Identified)?;
        self.expect(&Token::By)?;

        match self.current().clone() {
            Token::StringLiteral(password) => {
                self.advance();
                Ok(CreateUserStatement { username, password })
            }
            _ => Err(self.unexpected("password string")),
        }
    }

    /// `name TYPE[(length)] [PRIMARY KEY] [NOT NULL] [NULL]`
    fn parse_field_def(&mut self) -> Result<FieldDef> {
        let name = self.expect_identifier()?;
        let (field_type, length) = self.parse_field_type()?;

        let mut field = FieldDef {
            name,
            field_type,
            length,
            primary_key: false,
            nullable: true,
        };

        loop {
            match self.current() {
                Token::Primary => {
                    self.advance();
                    self.expect(&Token::Key)?;
                    field.primary_key = true;
                }
                Token::Not => {
                    self.advance();
                    self.expect(&Token::Null)?;
                    field.nullable = false;
                }
                Token::Null => {
                    self.advance();
                    field.nullable = true;
                }
                _ => break,
            }
        }

        Ok(field)
    }

    /// Type name with optional `(length)`; types without a fixed size
    /// require the length
    fn parse_field_type(&mut self) -> Result<(FieldType, i32)> {
        let field_type = match self.current().clone() {
            Token::Int => FieldType::Int,
            Token::Varchar => FieldType::Varchar,
            Token::Char => FieldType::Char,
            Token::Date => FieldType::Date,
            Token::Float | Token::Double => FieldType::Float,
            Token::Identifier(name) => FieldType::from_name(&name)?,
            _ => return Err(self.unexpected("data type")),
        };
        self.advance();

        let length = if self.check(&Token::LParen) {
            self.advance();
            let n = self.expect_integer()?;
            self.expect(&Token::RParen)?;
            i32::try_from(n)
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| Error::ParseError(format!("invalid length {} for {}", n, field_type)))?
        } else {
            let default = field_type.default_length();
            if default < 0 {
                return Err(Error::LengthRequired(field_type.to_string()));
            }
            default
        };

        Ok((field_type, length))
    }

    // ========== ALTER / DROP / RENAME ==========

    fn parse_alter(&mut self) -> Result<AlterTableStatement> {
        self.expect(&Token::Alter)?;
        self.expect(&Token::Table)?;
        let table_name = self.expect_identifier()?;

        let action = match self.current() {
            Token::Add => {
                self.advance();
                self.skip_column_keyword();
                AlterAction::AddColumn(self.parse_field_def()?)
            }
            Token::Drop => {
                self.advance();
                self.skip_column_keyword();
                AlterAction::DropColumn(self.expect_identifier()?)
            }
            Token::Modify => {
                self.advance();
                self.skip_column_keyword();
                let column = self.expect_identifier()?;
                let (field_type, length) = self.parse_field_type()?;
                AlterAction::ModifyColumn {
                    column,
                    field_type,
                    length,
                }
            }
            Token::Rename => {
                self.advance();
                self.skip_column_keyword();
                let old_name = self.expect_identifier()?;
                self.expect(&Token::To)?;
                let new_name = self.expect_identifier()?;
                AlterAction::RenameColumn { old_name, new_name }
            }
            _ => return Err(self.unexpected("ADD, DROP, MODIFY, or RENAME")),
        };

        Ok(AlterTableStatement { table_name, action })
    }

    fn skip_column_keyword(&mut self) {
        if self.check(&Token::Column) {
            self.advance();
        }
    }

    fn parse_drop(&mut self) -> Result<Statement> {
        self.expect(&Token::Drop)?;

        match self.current() {
            Token::Table => {
                self.advance();
                Ok(Statement::DropTable(self.expect_identifier()?))
            }
            Token::User => {
                self.advance();
                Ok(Statement::DropUser(self.expect_identifier()?))
            }
            _ => Err(self.unexpected("TABLE or USER")),
        }
    }

    fn parse_rename(&mut self) -> Result<Statement> {
        self.expect(&Token::Rename)?;
        self.expect(&Token::Table)?;
        let old_name = self.expect_identifier()?;
        self.expect(&Token::To)?;
        let new_name = self.expect_identifier()?;

        Ok(Statement::RenameTable { old_name, new_name })
    }

    // ========== GRANT / REVOKE ==========

    fn parse_grant(&mut self) -> Result<Statement> {
        self.expect(&Token::Grant)?;
        let permissions = self.parse_permission_list()?;
        self.expect(&Token::To)?;
        let username = self.expect_identifier()?;

        Ok(Statement::Grant(PrivilegeStatement {
            permissions,
            username,
        }))
    }

    fn parse_revoke(&mut self) -> Result<Statement> {
        self.expect(&Token::Revoke)?;
        let permissions = self.parse_permission_list()?;
        self.expect(&Token::From)?;
        let username = self.expect_identifier()?;

        Ok(Statement::Revoke(PrivilegeStatement {
            permissions,
            username,
        }))
    }

    /// Permission names are identifiers like `CREATE_TABLE` or plain
    /// keywords like `SELECT`; both are upper-cased
    fn parse_permission_list(&mut self) -> Result<Vec<String>> {
        let mut permissions = Vec::new();

        loop {
            let name = match self.current() {
                Token::Identifier(name) => name.to_uppercase(),
                Token::Select
                | Token::Insert
                | Token::Update
                | Token::Delete
                | Token::Grant
                | Token::Revoke
                | Token::All => self.current().to_string(),
                _ => return Err(self.unexpected("permission name")),
            };
            self.advance();
            permissions.push(name);

            if !self.check(&Token::Comma) {
                break;
            }
            self.advance();
        }

        Ok(permissions)
    }

    // ========== Helper Methods ==========

    fn parse_identifier_list(&mut self) -> Result<Vec<String>> {
        let mut identifiers = vec![self.expect_identifier()?];

        while self.check(&Token::Comma) {
            self.advance();
            identifiers.push(self.expect_identifier()?);
        }

        Ok(identifiers)
    }

    fn current(&self) -> &Token {
        self.tokens
            .get(self.position)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position + 1).map(|s| &s.token)
    }

    fn peek_is_eof(&self) -> bool {
        matches!(self.peek(), None | Some(Token::Eof))
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current(), Token::Eof)
    }

    fn check(&self, token: &Token) -> bool {
        std::mem::discriminant(self.current()) == std::mem::discriminant(token)
    }

    /// Build an "unexpected token" error at the current position
    fn unexpected(&self, expected: &str) -> Error {
        let (line, column) = self
            .tokens
            .get(self.position)
            .or_else(|| self.tokens.last())
            .map(|s| (s.line, s.column))
            .unwrap_or((1, 1));

        Error::UnexpectedToken {
            expected: expected.to_string(),
            found: format!("{}", self.current()),
            line,
            column,
        }
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.check(token) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&token.to_string()))
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        match self.current().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn expect_integer(&mut self) -> Result<i64> {
        match self.current().clone() {
            Token::IntegerLiteral(n) => {
                self.advance();
                Ok(n)
            }
            _ => Err(self.unexpected("integer")),
        }
    }

    // ========== Transaction Statements ==========

    fn parse_begin(&mut self) -> Result<Statement> {
        self.expect(&Token::Begin)?;
        Ok(Statement::Begin)
    }

    fn parse_commit(&mut self) -> Result<Statement> {
        self.expect(&Token::Commit)?;
        Ok(Statement::Commit)
    }

    fn parse_rollback(&mut self) -> Result<Statement> {
        self.expect(&Token::Rollback)?;
        Ok(Statement::Rollback)
    }
}

/// Parse a single SQL statement
pub fn parse(sql: &str) -> Result<Statement> {
    Parser::new(sql)?.parse()
}
