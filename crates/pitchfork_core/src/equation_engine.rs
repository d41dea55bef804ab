use crate::traits::{DynamicalSystem, Scalar};
use anyhow::{anyhow, bail, Result};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};

/// State-variable slots of a scalar flow, in VM order.
pub const STATE_VARIABLES: [&str; 2] = ["x", "t"];
/// Parameter slots of a scalar flow, in VM order.
pub const PARAMETERS: [&str; 1] = ["r"];
/// Reserved name of the imaginary unit, as emitted by symbolic solvers.
pub const IMAGINARY_UNIT: &str = "i";

/// Elementary functions understood by the parser and the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Exp,
    Ln,
    Sqrt,
    Cbrt,
    Abs,
    Sinh,
    Cosh,
    Tanh,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        let function = match name {
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "exp" => Function::Exp,
            "log" | "ln" => Function::Ln,
            "sqrt" => Function::Sqrt,
            "cbrt" => Function::Cbrt,
            "abs" => Function::Abs,
            "sinh" => Function::Sinh,
            "cosh" => Function::Cosh,
            "tanh" => Function::Tanh,
            _ => return None,
        };
        Some(function)
    }

    fn apply<T: Scalar>(self, a: T) -> T {
        match self {
            Function::Sin => a.sin(),
            Function::Cos => a.cos(),
            Function::Tan => a.tan(),
            Function::Exp => a.exp(),
            Function::Ln => a.ln(),
            Function::Sqrt => a.sqrt(),
            Function::Cbrt => a.cbrt(),
            Function::Abs => a.abs(),
            Function::Sinh => a.sinh(),
            Function::Cosh => a.cosh(),
            Function::Tanh => a.tanh(),
        }
    }
}

/// OpCodes for the Stack-based Virtual Machine.
/// The VM operates on a stack of `Scalar` values (f64, Complex or Dual).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    /// Pushes a constant `f64` value onto the stack.
    LoadConst(f64),
    /// Pushes the value of a state variable (by index) onto the stack.
    /// Indices follow `STATE_VARIABLES` (0=x, 1=t).
    LoadVar(usize),
    /// Pushes the value of a parameter (by index) onto the stack.
    LoadParam(usize),
    /// Pushes the imaginary unit (NaN on real-only scalars).
    LoadImaginary,
    /// Pops top two values (b, a), pushes (a + b).
    Add,
    /// Pops top two values (b, a), pushes (a - b).
    Sub,
    /// Pops top two values (b, a), pushes (a * b).
    Mul,
    /// Pops top two values (b, a), pushes (a / b).
    Div,
    /// Pops top two values (b, a), pushes (a ^ b).
    Pow,
    /// Pops top value (a), pushes -a.
    Neg,
    /// Pops top value (a), pushes f(a).
    Call(Function),
}

/// Represents a compiled sequence of operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bytecode {
    pub ops: Vec<OpCode>,
}

impl Bytecode {
    pub fn new() -> Self {
        Self { ops: Vec::new() }
    }
}

/// Stack-based Virtual Machine for evaluating equations.
///
/// The VM is stateless; `execute` takes all necessary context:
/// - `bytecode`: Instructions to run.
/// - `vars`: State variables (read-only).
/// - `params`: Parameter vector (read-only).
/// - `stack`: A mutable buffer for intermediate computations.
///
/// Returns the result of the evaluation (the value left on the stack).
pub struct VM;

impl VM {
    pub fn execute<T: Scalar>(bytecode: &Bytecode, vars: &[T], params: &[T], stack: &mut Vec<T>) -> T {
        stack.clear();

        for op in &bytecode.ops {
            match *op {
                OpCode::LoadConst(val) => stack.push(T::from_f64(val)),
                OpCode::LoadVar(idx) => stack.push(vars.get(idx).copied().unwrap_or_else(T::zero)),
                OpCode::LoadParam(idx) => {
                    stack.push(params.get(idx).copied().unwrap_or_else(T::zero))
                }
                OpCode::LoadImaginary => stack.push(T::imaginary_unit()),
                OpCode::Add => binary(stack, |a, b| a + b),
                OpCode::Sub => binary(stack, |a, b| a - b),
                OpCode::Mul => binary(stack, |a, b| a.product(b)),
                OpCode::Div => binary(stack, |a, b| a.quotient(b)),
                OpCode::Pow => binary(stack, |a, b| a.powf(b)),
                OpCode::Neg => unary(stack, |a| -a),
                OpCode::Call(function) => unary(stack, |a| function.apply(a)),
            }
        }

        // Compiled bytecode is balanced, so exactly one value remains.
        stack.pop().unwrap_or_else(T::zero)
    }
}

fn binary<T: Scalar>(stack: &mut Vec<T>, op: impl Fn(T, T) -> T) {
    if let (Some(b), Some(a)) = (stack.pop(), stack.pop()) {
        stack.push(op(a, b));
    }
}

fn unary<T: Scalar>(stack: &mut Vec<T>, op: impl Fn(T) -> T) {
    if let Some(a) = stack.pop() {
        stack.push(op(a));
    }
}

// --- AST & Parser ---

/// Abstract Syntax Tree nodes for expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Binary(Box<Expr>, char, Box<Expr>), // char is operator +, -, *, /, ^
    Unary(char, Box<Expr>),             // -
    Call(String, Box<Expr>),            // functions like sin(x)
}

impl Expr {
    /// Collects the names of all variables referenced by the expression.
    pub fn free_variables(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables(&self, names: &mut BTreeSet<String>) {
        match self {
            Expr::Number(_) => {}
            Expr::Variable(name) => {
                if named_constant(name).is_none() && name != IMAGINARY_UNIT {
                    names.insert(name.clone());
                }
            }
            Expr::Binary(left, _, right) => {
                left.collect_variables(names);
                right.collect_variables(names);
            }
            Expr::Unary(_, operand) => operand.collect_variables(names),
            Expr::Call(_, arg) => arg.collect_variables(names),
        }
    }
}

fn named_constant(name: &str) -> Option<f64> {
    match name {
        "pi" => Some(std::f64::consts::PI),
        "e" => Some(std::f64::consts::E),
        _ => None,
    }
}

/// Compiles an AST (`Expr`) into `Bytecode`.
/// Resolves variable and parameter names to indices.
pub struct Compiler {
    pub var_map: HashMap<String, usize>,
    pub param_map: HashMap<String, usize>,
}

impl Compiler {
    pub fn new(var_names: &[&str], param_names: &[&str]) -> Self {
        let var_map = var_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), i))
            .collect();
        let param_map = param_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), i))
            .collect();
        Self { var_map, param_map }
    }

    /// Compiler for ẋ = f(x, t, r).
    pub fn scalar_flow() -> Self {
        Self::new(&STATE_VARIABLES, &PARAMETERS)
    }

    pub fn compile(&self, expr: &Expr) -> Result<Bytecode> {
        let mut ops = Vec::new();
        self.compile_recursive(expr, &mut ops)?;
        Ok(Bytecode { ops })
    }

    fn compile_recursive(&self, expr: &Expr, ops: &mut Vec<OpCode>) -> Result<()> {
        match expr {
            Expr::Number(n) => ops.push(OpCode::LoadConst(*n)),
            Expr::Variable(name) => {
                if let Some(&idx) = self.var_map.get(name) {
                    ops.push(OpCode::LoadVar(idx));
                } else if let Some(&idx) = self.param_map.get(name) {
                    ops.push(OpCode::LoadParam(idx));
                } else if let Some(value) = named_constant(name) {
                    ops.push(OpCode::LoadConst(value));
                } else if name == IMAGINARY_UNIT {
                    ops.push(OpCode::LoadImaginary);
                } else {
                    bail!("Unknown variable or parameter: {name}");
                }
            }
            Expr::Binary(left, op, right) => {
                self.compile_recursive(left, ops)?;
                self.compile_recursive(right, ops)?;
                let code = match op {
                    '+' => OpCode::Add,
                    '-' => OpCode::Sub,
                    '*' => OpCode::Mul,
                    '/' => OpCode::Div,
                    '^' => OpCode::Pow,
                    _ => bail!("Unknown binary operator: {op}"),
                };
                ops.push(code);
            }
            Expr::Unary(op, operand) => {
                self.compile_recursive(operand, ops)?;
                match op {
                    '-' => ops.push(OpCode::Neg),
                    _ => bail!("Unknown unary operator: {op}"),
                }
            }
            Expr::Call(func, arg) => {
                let function =
                    Function::from_name(func).ok_or_else(|| anyhow!("Unknown function: {func}"))?;
                self.compile_recursive(arg, ops)?;
                ops.push(OpCode::Call(function));
            }
        }
        Ok(())
    }
}

// --- Simple Parser ---

/// Parses a string expression into an AST.
pub fn parse(input: &str) -> Result<Expr> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        bail!("Expression is empty.");
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expression()?;
    if let Some(token) = parser.peek() {
        bail!("Unexpected trailing token {token:?} in \"{input}\"");
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut num_str = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_ascii_digit() || d == '.' {
                    num_str.push(d);
                    chars.next();
                } else if (d == 'e' || d == 'E') && !num_str.is_empty() {
                    // Exponent only when followed by a digit or a signed digit,
                    // so "2e" and "2exp(x)" keep their implicit products.
                    let mut lookahead = chars.clone();
                    lookahead.next();
                    let exponent_follows = match lookahead.next() {
                        Some(s) if s.is_ascii_digit() => true,
                        Some('+') | Some('-') => {
                            matches!(lookahead.next(), Some(s) if s.is_ascii_digit())
                        }
                        _ => false,
                    };
                    if !exponent_follows {
                        break;
                    }
                    num_str.push(d);
                    chars.next();
                    if let Some(&sign) = chars.peek() {
                        if sign == '+' || sign == '-' {
                            num_str.push(sign);
                            chars.next();
                        }
                    }
                } else {
                    break;
                }
            }
            let value = num_str
                .parse()
                .map_err(|_| anyhow!("Invalid number literal: {num_str}"))?;
            tokens.push(Token::Number(value));
        } else if c.is_alphabetic() {
            let mut ident = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_alphanumeric() || d == '_' {
                    ident.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Identifier(ident));
        } else {
            let token = match c {
                '+' => Token::Plus,
                '-' => Token::Minus,
                '*' => Token::Star,
                '/' => Token::Slash,
                '^' => Token::Caret,
                '(' => Token::LParen,
                ')' => Token::RParen,
                _ => bail!("Unexpected character '{c}' in \"{input}\""),
            };
            tokens.push(token);
            chars.next();
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).cloned()
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_expression(&mut self) -> Result<Expr> {
        self.parse_term()
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let mut left = self.parse_factor()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Plus => '+',
                Token::Minus => '-',
                _ => break,
            };
            self.consume();
            let right = self.parse_factor()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Star => {
                    self.consume();
                    '*'
                }
                Token::Slash => {
                    self.consume();
                    '/'
                }
                // Implicit multiplication: "2x", "2(x+1)", "x sin(x)".
                Token::Number(_) | Token::Identifier(_) | Token::LParen => '*',
                _ => break,
            };
            let right = self.parse_unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Minus) => {
                self.consume();
                let expr = self.parse_unary()?;
                Ok(Expr::Unary('-', Box::new(expr)))
            }
            Some(Token::Plus) => {
                self.consume();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    // Right-associative, binds tighter than unary minus: -x^2 = -(x^2).
    fn parse_power(&mut self) -> Result<Expr> {
        let base = self.parse_primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.consume();
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(Box::new(base), '^', Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.consume() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Identifier(name)) => {
                if Function::from_name(&name).is_some() {
                    match self.consume() {
                        Some(Token::LParen) => {}
                        _ => bail!("Expected '(' after function {name}"),
                    }
                    let arg = self.parse_expression()?;
                    match self.consume() {
                        Some(Token::RParen) => Ok(Expr::Call(name, Box::new(arg))),
                        _ => bail!("Expected ')'"),
                    }
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            Some(Token::LParen) => {
                let expr = self.parse_expression()?;
                match self.consume() {
                    Some(Token::RParen) => Ok(expr),
                    _ => bail!("Expected ')'"),
                }
            }
            Some(token) => bail!("Unexpected token {token:?}"),
            None => bail!("Unexpected end of expression"),
        }
    }
}

// --- FlowSystem ---

/// ẋ = f(x, t, r) as a one-dimensional `DynamicalSystem` driven by the VM,
/// with the control parameter r frozen.
pub struct FlowSystem<T: Scalar> {
    pub equation: Bytecode,
    pub params: Vec<T>,
    // Interior mutability for VM stack to avoid allocation in apply.
    // This makes the system !Sync.
    stack: RefCell<Vec<T>>,
}

impl<T: Scalar> FlowSystem<T> {
    pub fn new(equation: Bytecode, r: T) -> Self {
        Self {
            equation,
            params: vec![r],
            stack: RefCell::new(Vec::with_capacity(64)),
        }
    }

    /// Moves the frozen parameter without recompiling.
    pub fn set_r(&mut self, r: T) {
        match self.params.first_mut() {
            Some(slot) => *slot = r,
            None => self.params.push(r),
        }
    }
}

impl<T: Scalar> DynamicalSystem<T> for FlowSystem<T> {
    fn dimension(&self) -> usize {
        1
    }

    fn apply(&self, t: T, x: &[T], out: &mut [T]) {
        let mut stack = self.stack.borrow_mut();
        let vars = [x[0], t];
        out[0] = VM::execute(&self.equation, &vars, &self.params, &mut stack);
    }
}
