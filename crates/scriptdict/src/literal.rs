//! Dictionary literal construction.
//!
//! Two forms are recognized:
//!
//! ```text
//! {expr: expr, expr: expr,}     keys are evaluated and converted to strings
//! #{name: expr, other-name: expr}   keys are bare [A-Za-z0-9_-]+ words
//! ```
//!
//! A `{` followed by a single expression and `}` is a block in the host language rather
//! than a dictionary; [`parse_dict_literal`] finds this out by skipping the expression
//! without evaluating it and reports [`LiteralOutcome::NotDict`].

use crate::{
    error::{DictError, DictResult},
    heap::{Heap, HeapId},
    resource::ResourceTracker,
    tracer::HeapTracer,
    value::{Special, Value},
};

/// Position in the source text of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    #[must_use]
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    /// Byte offset into the source.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// The unconsumed remainder of the source.
    #[must_use]
    pub fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    #[must_use]
    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    #[must_use]
    pub fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Consumes `expected` if it is next.
    pub fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    /// Skips whitespace, including line breaks.
    pub fn skip_white(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    /// Consumes the longest prefix whose characters satisfy `pred`.
    pub fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let end = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        self.pos += end;
        &rest[..end]
    }
}

/// The expression evaluator a dictionary literal calls back into.
pub trait ExprEvaluator {
    /// Evaluates one expression at `cursor`, leaving the cursor after it.
    ///
    /// The returned value is owned by the caller.
    fn eval<T: ResourceTracker, R: HeapTracer>(
        &mut self,
        heap: &mut Heap<T, R>,
        cursor: &mut Cursor<'_>,
    ) -> DictResult<Value>;

    /// Moves the cursor past one expression without evaluating it.
    fn skip(&mut self, cursor: &mut Cursor<'_>) -> DictResult<()>;
}

/// Result of [`parse_dict_literal`].
#[derive(Debug, PartialEq)]
pub enum LiteralOutcome {
    /// An owned reference to the new dictionary.
    Dict(Value),
    /// The text is `{expr}`, not a dictionary. The cursor has not moved.
    NotDict,
}

/// Parses a dictionary literal starting at `{` (or `#{` when `literal_keys` is set).
///
/// On success the cursor is past the closing brace and any whitespace after it. On failure
/// the partially built dictionary is released.
pub fn parse_dict_literal<T, R, E>(
    heap: &mut Heap<T, R>,
    cursor: &mut Cursor<'_>,
    literal_keys: bool,
    evaluator: &mut E,
) -> DictResult<LiteralOutcome>
where
    T: ResourceTracker,
    R: HeapTracer,
    E: ExprEvaluator,
{
    let mut look = *cursor;
    if literal_keys && !look.eat('#') {
        return Err(DictError::syntax(format!("expected #{{: {}", look.rest())));
    }
    if !look.eat('{') {
        return Err(DictError::syntax(format!("expected {{: {}", look.rest())));
    }
    look.skip_white();

    if !literal_keys && look.peek() != Some('}') {
        let mut probe = look;
        evaluator.skip(&mut probe)?;
        probe.skip_white();
        if probe.peek() == Some('}') {
            return Ok(LiteralOutcome::NotDict);
        }
    }

    *cursor = look;
    let dict = heap.dict_alloc()?;
    let dict_ref = heap.new_ref(dict);
    match parse_entries(heap, cursor, literal_keys, evaluator, dict) {
        Ok(()) => {
            cursor.skip_white();
            Ok(LiteralOutcome::Dict(dict_ref))
        }
        Err(err) => {
            dict_ref.drop_with_heap(heap);
            Err(err)
        }
    }
}

fn parse_entries<T, R, E>(
    heap: &mut Heap<T, R>,
    cursor: &mut Cursor<'_>,
    literal_keys: bool,
    evaluator: &mut E,
    dict: HeapId,
) -> DictResult<()>
where
    T: ResourceTracker,
    R: HeapTracer,
    E: ExprEvaluator,
{
    loop {
        cursor.skip_white();
        match cursor.peek() {
            Some('}') => {
                cursor.bump();
                return Ok(());
            }
            None => return Err(missing_end(cursor)),
            Some(_) => {}
        }

        let key = if literal_keys {
            literal_key(cursor)?.to_owned()
        } else {
            let key = evaluator.eval(heap, cursor)?;
            let converted = key.to_str(heap).map(std::borrow::Cow::into_owned);
            key.drop_with_heap(heap);
            converted?
        };

        cursor.skip_white();
        if !cursor.eat(':') {
            return Err(DictError::syntax(format!(
                "missing colon in dictionary: {}",
                cursor.rest()
            )));
        }
        cursor.skip_white();

        let value = evaluator.eval(heap, cursor)?;
        if heap.dict_has_key(dict, &key) {
            value.drop_with_heap(heap);
            return Err(DictError::duplicate_key(&key));
        }
        heap.dict_insert(dict, &key, value)?;

        cursor.skip_white();
        let had_comma = cursor.eat(',');
        cursor.skip_white();
        if cursor.eat('}') {
            return Ok(());
        }
        if !had_comma {
            if cursor.is_eof() {
                return Err(missing_end(cursor));
            }
            return Err(DictError::syntax(format!(
                "missing comma in dictionary: {}",
                cursor.rest()
            )));
        }
    }
}

fn missing_end(cursor: &Cursor<'_>) -> DictError {
    DictError::syntax(format!("missing end of dictionary '}}': {}", cursor.rest()))
}

fn is_literal_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn literal_key<'a>(cursor: &mut Cursor<'a>) -> DictResult<&'a str> {
    let key = cursor.take_while(is_literal_key_char);
    if key.is_empty() {
        return Err(DictError::syntax(format!("invalid key in dictionary: {}", cursor.rest())));
    }
    Ok(key)
}

/// A small evaluator for constant expressions.
///
/// Understands numbers, floats, single- and double-quoted strings, `v:true`, `v:false`,
/// `v:null`, `v:none`, list literals and both dictionary literal forms. Bare names are
/// looked up in an optional variables dictionary.
#[derive(Debug, Default)]
pub struct LiteralEvaluator {
    variables: Option<HeapId>,
}

impl LiteralEvaluator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves bare names against `variables`.
    #[must_use]
    pub fn with_variables(variables: HeapId) -> Self {
        Self {
            variables: Some(variables),
        }
    }
}

impl ExprEvaluator for LiteralEvaluator {
    fn eval<T: ResourceTracker, R: HeapTracer>(
        &mut self,
        heap: &mut Heap<T, R>,
        cursor: &mut Cursor<'_>,
    ) -> DictResult<Value> {
        cursor.skip_white();
        match cursor.peek() {
            Some('\'') => Ok(Value::Str(scan_single_quoted(cursor)?)),
            Some('"') => Ok(Value::Str(scan_double_quoted(cursor)?)),
            Some(c) if c.is_ascii_digit() || c == '-' => scan_number(cursor),
            Some('[') => self.eval_list(heap, cursor),
            Some('{') => match parse_dict_literal(heap, cursor, false, self)? {
                LiteralOutcome::Dict(dict) => Ok(dict),
                LiteralOutcome::NotDict => Err(DictError::syntax(format!(
                    "expression blocks are not supported: {}",
                    cursor.rest()
                ))),
            },
            Some('#') if cursor.peek_nth(1) == Some('{') => match parse_dict_literal(heap, cursor, true, self)? {
                LiteralOutcome::Dict(dict) => Ok(dict),
                LiteralOutcome::NotDict => Err(DictError::syntax("invalid #{ literal")),
            },
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let name = scan_name(cursor);
                self.eval_name(heap, name)
            }
            _ => Err(DictError::syntax(format!("invalid expression: {}", cursor.rest()))),
        }
    }

    fn skip(&mut self, cursor: &mut Cursor<'_>) -> DictResult<()> {
        skip_expr(cursor)
    }
}

impl LiteralEvaluator {
    fn eval_name<T: ResourceTracker, R: HeapTracer>(&self, heap: &Heap<T, R>, name: &str) -> DictResult<Value> {
        match name {
            "v:true" => return Ok(Value::Bool(true)),
            "v:false" => return Ok(Value::Bool(false)),
            "v:null" => return Ok(Value::Special(Special::Null)),
            "v:none" => return Ok(Value::Special(Special::None)),
            _ => {}
        }
        self.variables
            .and_then(|vars| heap.dict_get_value(vars, name))
            .ok_or_else(|| DictError::key_not_found(name))
    }

    fn eval_list<T: ResourceTracker, R: HeapTracer>(
        &mut self,
        heap: &mut Heap<T, R>,
        cursor: &mut Cursor<'_>,
    ) -> DictResult<Value> {
        cursor.bump();
        let list = heap.list_alloc()?;
        let list_ref = heap.new_ref(list);
        match self.eval_list_items(heap, cursor, list) {
            Ok(()) => Ok(list_ref),
            Err(err) => {
                list_ref.drop_with_heap(heap);
                Err(err)
            }
        }
    }

    fn eval_list_items<T: ResourceTracker, R: HeapTracer>(
        &mut self,
        heap: &mut Heap<T, R>,
        cursor: &mut Cursor<'_>,
        list: HeapId,
    ) -> DictResult<()> {
        loop {
            cursor.skip_white();
            if cursor.eat(']') {
                return Ok(());
            }
            let item = self.eval(heap, cursor)?;
            heap.list_append(list, item)?;
            cursor.skip_white();
            if !cursor.eat(',') {
                cursor.skip_white();
                if cursor.eat(']') {
                    return Ok(());
                }
                return Err(DictError::syntax(format!("missing comma in list: {}", cursor.rest())));
            }
        }
    }
}

/// Scans a variable name, including an optional one-letter scope prefix such as `v:`.
fn scan_name<'a>(cursor: &mut Cursor<'a>) -> &'a str {
    let start = *cursor;
    if cursor.peek().is_some_and(|c| c.is_ascii_alphabetic())
        && cursor.peek_nth(1) == Some(':')
        && cursor.peek_nth(2).is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        cursor.bump();
        cursor.bump();
    }
    cursor.take_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '#');
    &start.rest()[..cursor.pos() - start.pos()]
}

fn scan_single_quoted(cursor: &mut Cursor<'_>) -> DictResult<String> {
    cursor.bump();
    let mut out = String::new();
    loop {
        match cursor.bump() {
            Some('\'') if cursor.eat('\'') => out.push('\''),
            Some('\'') => return Ok(out),
            Some(c) => out.push(c),
            None => return Err(DictError::syntax("missing quote")),
        }
    }
}

fn scan_double_quoted(cursor: &mut Cursor<'_>) -> DictResult<String> {
    cursor.bump();
    let mut out = String::new();
    loop {
        match cursor.bump() {
            Some('"') => return Ok(out),
            Some('\\') => match cursor.bump() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('e') => out.push('\x1b'),
                Some(c) => out.push(c),
                None => return Err(DictError::syntax("missing quote")),
            },
            Some(c) => out.push(c),
            None => return Err(DictError::syntax("missing quote")),
        }
    }
}

fn scan_number(cursor: &mut Cursor<'_>) -> DictResult<Value> {
    let start = *cursor;
    cursor.eat('-');
    let hex = cursor.peek() == Some('0') && matches!(cursor.peek_nth(1), Some('x' | 'X'));
    if hex {
        cursor.bump();
        cursor.bump();
        let digits = cursor.take_while(|c| c.is_ascii_hexdigit());
        let magnitude = i64::from_str_radix(digits, 16).map_err(|_| invalid_number(&start))?;
        let negative = start.peek() == Some('-');
        return Ok(Value::Number(if negative { -magnitude } else { magnitude }));
    }

    if cursor.take_while(|c| c.is_ascii_digit()).is_empty() {
        return Err(invalid_number(&start));
    }
    let mut is_float = false;
    if cursor.peek() == Some('.') && cursor.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
        is_float = true;
        cursor.bump();
        cursor.take_while(|c| c.is_ascii_digit());
        let mut exp = *cursor;
        if matches!(exp.bump(), Some('e' | 'E')) {
            if matches!(exp.peek(), Some('+' | '-')) {
                exp.bump();
            }
            if !exp.take_while(|c| c.is_ascii_digit()).is_empty() {
                *cursor = exp;
            }
        }
    }

    let text = &start.rest()[..cursor.pos() - start.pos()];
    if is_float {
        text.parse().map(Value::Float).map_err(|_| invalid_number(&start))
    } else {
        text.parse().map(Value::Number).map_err(|_| invalid_number(&start))
    }
}

fn invalid_number(start: &Cursor<'_>) -> DictError {
    DictError::syntax(format!("invalid number: {}", start.rest()))
}

/// Moves past one constant expression without building any value.
fn skip_expr(cursor: &mut Cursor<'_>) -> DictResult<()> {
    cursor.skip_white();
    match cursor.peek() {
        Some('\'') => scan_single_quoted(cursor).map(drop),
        Some('"') => scan_double_quoted(cursor).map(drop),
        Some(c) if c.is_ascii_digit() || c == '-' => scan_number(cursor).map(drop),
        Some('[') => {
            cursor.bump();
            loop {
                cursor.skip_white();
                if cursor.eat(']') {
                    return Ok(());
                }
                skip_expr(cursor)?;
                cursor.skip_white();
                if !cursor.eat(',') {
                    cursor.skip_white();
                    return if cursor.eat(']') {
                        Ok(())
                    } else {
                        Err(DictError::syntax(format!("missing comma in list: {}", cursor.rest())))
                    };
                }
            }
        }
        Some('{') => skip_braces(cursor, false),
        Some('#') if cursor.peek_nth(1) == Some('{') => {
            cursor.bump();
            skip_braces(cursor, true)
        }
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            scan_name(cursor);
            Ok(())
        }
        _ => Err(DictError::syntax(format!("invalid expression: {}", cursor.rest()))),
    }
}

fn skip_braces(cursor: &mut Cursor<'_>, literal_keys: bool) -> DictResult<()> {
    cursor.bump();
    loop {
        cursor.skip_white();
        if cursor.eat('}') {
            return Ok(());
        }
        if cursor.is_eof() {
            return Err(missing_end(cursor));
        }
        if literal_keys {
            literal_key(cursor)?;
        } else {
            skip_expr(cursor)?;
        }
        cursor.skip_white();
        if cursor.eat(':') {
            skip_expr(cursor)?;
            cursor.skip_white();
        }
        cursor.eat(',');
    }
}
