//! CLI harness driving the pipeline end to end: reads a tiny
//! S-expression-shaped IR format, compiles one function, and writes
//! assembly to standard output (SPEC_FULL.md "CLI surface").
//!
//! Example input:
//! ```text
//! (NStore ty=U8 sym=g value=0 (Constant ty=U8 value=5))
//! ```

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use z80_codegen::frame::RegisterSaveFlags;
use z80_codegen::ir::{BaseType, Node, Opcode, TypeTag};
use z80_codegen::settings::{Flags, FeatureVector, Variant};
use z80_codegen::symtab::VecSymbolTable;

/// Compile one function's IR to Z80-family assembly.
#[derive(Debug, Parser)]
#[command(name = "z80asmgen", version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// IR input file; reads standard input if omitted.
    input: Option<PathBuf>,

    /// Target CPU variant.
    #[arg(long, default_value = "z80")]
    target: String,

    /// Optimisation level, 0-3.
    #[arg(short = 'O', long, default_value_t = 0)]
    opt_level: u8,

    /// Optimise for code size over speed.
    #[arg(long)]
    optsize: bool,

    /// Assume banked output mode (adds the return-bank argument slot).
    #[arg(long)]
    banked: bool,

    /// Name of the function being compiled.
    #[arg(long, default_value = "f")]
    function: String,

    /// Stack frame size in bytes.
    #[arg(long, default_value_t = 0)]
    frame_len: u32,

    /// Enable verbose pass logging (requires `RUST_LOG` to pick a level).
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.verbose {
        env_logger::init();
    }

    let text = match &args.input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("reading standard input")?;
            buf
        }
    };

    let variant = Variant::from_str(&args.target).map_err(|e| anyhow!(e.to_string()))?;
    let mut builder = Flags::builder(variant)
        .opt_level(args.opt_level)
        .prefer_size(args.optsize);
    if args.banked {
        builder = builder.set_feature(FeatureVector::BANKED, true);
    }
    let settings = builder.finish();

    let mut symtab = VecSymbolTable::new();
    let mut parser = ir_parse::Parser::new(&text, &mut symtab);
    let mut root = parser
        .parse_node()
        .context("parsing IR input")?;

    let asm = z80_codegen::compile_function(
        &args.function,
        &mut root,
        args.frame_len,
        RegisterSaveFlags::empty(),
        &settings,
        &symtab,
    )
    .map_err(|e| anyhow!("{} (tag: {})", e, e.tag()))?;

    print!("{}", asm);
    Ok(())
}

/// A minimal recursive-descent parser for the S-expression IR format this
/// binary accepts: `(Opcode key=value... child...)`.
mod ir_parse {
    use super::*;
    use std::iter::Peekable;
    use std::str::Chars;

    pub struct Parser<'a> {
        chars: Peekable<Chars<'a>>,
        symtab: &'a mut VecSymbolTable,
    }

    impl<'a> Parser<'a> {
        pub fn new(text: &'a str, symtab: &'a mut VecSymbolTable) -> Self {
            Parser {
                chars: text.chars().peekable(),
                symtab,
            }
        }

        fn skip_ws(&mut self) {
            while matches!(self.chars.peek(), Some(c) if c.is_whitespace()) {
                self.chars.next();
            }
        }

        fn expect(&mut self, c: char) -> Result<()> {
            self.skip_ws();
            match self.chars.next() {
                Some(got) if got == c => Ok(()),
                got => Err(anyhow!("expected '{}', found {:?}", c, got)),
            }
        }

        fn read_token(&mut self) -> String {
            self.skip_ws();
            let mut s = String::new();
            while let Some(&c) = self.chars.peek() {
                if c.is_whitespace() || c == '(' || c == ')' || c == '=' {
                    break;
                }
                s.push(c);
                self.chars.next();
            }
            s
        }

        pub fn parse_node(&mut self) -> Result<Node> {
            self.expect('(')?;
            let op_name = self.read_token();
            let op = parse_opcode(&op_name)?;

            let mut ty = TypeTag::VOID;
            let mut value: u32 = 0;
            let mut val2: i32 = 0;
            let mut snum = None;
            let mut children = Vec::new();

            loop {
                self.skip_ws();
                match self.chars.peek() {
                    Some(')') => {
                        self.chars.next();
                        break;
                    }
                    Some('(') => children.push(self.parse_node()?),
                    Some(_) => {
                        let key = self.read_token();
                        self.expect('=')?;
                        let val = self.read_token();
                        match key.as_str() {
                            "ty" => ty = parse_type(&val)?,
                            "value" => {
                                value = val
                                    .parse()
                                    .with_context(|| format!("invalid value `{}`", val))?
                            }
                            "val2" => {
                                val2 = val
                                    .parse()
                                    .with_context(|| format!("invalid val2 `{}`", val))?
                            }
                            "sym" => snum = Some(self.symtab.intern(val)),
                            other => return Err(anyhow!("unknown key `{}`", other)),
                        }
                    }
                    None => return Err(anyhow!("unexpected end of input")),
                }
            }

            let mut node = Node::leaf(op, ty);
            node.value = value;
            node.val2 = val2;
            node.snum = snum;
            let mut it = children.into_iter();
            node.left = it.next().map(Box::new);
            node.right = it.next().map(Box::new);
            Ok(node)
        }
    }

    fn parse_type(s: &str) -> Result<TypeTag> {
        let (pointer, base) = match s.strip_prefix("ptr<") {
            Some(rest) => (true, rest.trim_end_matches('>')),
            None => (false, s),
        };
        let base = match base {
            "Void" => BaseType::Void,
            "I8" => BaseType::I8,
            "U8" => BaseType::U8,
            "I16" => BaseType::I16,
            "U16" => BaseType::U16,
            "I32" => BaseType::I32,
            "U32" => BaseType::U32,
            "I64" => BaseType::I64,
            "U64" => BaseType::U64,
            "F32" => BaseType::F32,
            "F64" => BaseType::F64,
            other => return Err(anyhow!("unknown type `{}`", other)),
        };
        Ok(if pointer {
            TypeTag::pointer_to(base)
        } else {
            TypeTag::new(base)
        })
    }

    fn parse_opcode(s: &str) -> Result<Opcode> {
        use Opcode::*;
        Ok(match s {
            "Constant" => Constant,
            "Name" => Name,
            "Label" => Label,
            "Local" => Local,
            "Argument" => Argument,
            "Reg" => Reg,
            "Deref" => Deref,
            "Eq" => Eq,
            "Plus" => Plus,
            "Minus" => Minus,
            "Star" => Star,
            "Slash" => Slash,
            "Percent" => Percent,
            "And" => And,
            "Or" => Or,
            "Hat" => Hat,
            "LtLt" => LtLt,
            "GtGt" => GtGt,
            "EqEq" => EqEq,
            "BangEq" => BangEq,
            "Lt" => Lt,
            "LtEq" => LtEq,
            "Gt" => Gt,
            "GtEq" => GtEq,
            "AndAnd" => AndAnd,
            "OrOr" => OrOr,
            "Bang" => Bang,
            "Bool" => Bool,
            "Cast" => Cast,
            "PlusPlus" => PlusPlus,
            "MinusMinus" => MinusMinus,
            "PlusEq" => PlusEq,
            "MinusEq" => MinusEq,
            "StarEq" => StarEq,
            "SlashEq" => SlashEq,
            "PercentEq" => PercentEq,
            "AndEq" => AndEq,
            "OrEq" => OrEq,
            "HatEq" => HatEq,
            "ShlEq" => ShlEq,
            "ShrEq" => ShrEq,
            "FuncCall" => FuncCall,
            "Comma" => Comma,
            "ArgComma" => ArgComma,
            "Cleanup" => Cleanup,
            "NRef" => NRef,
            "NStore" => NStore,
            "LBRef" => LBRef,
            "LBStore" => LBStore,
            "LRef" => LRef,
            "LStore" => LStore,
            "RRef" => RRef,
            "RStore" => RStore,
            "RDeref" => RDeref,
            "REq" => REq,
            "CallName" => CallName,
            "BTst" => BTst,
            "ByteEq" => ByteEq,
            "ByteNe" => ByteNe,
            other => return Err(anyhow!("unknown opcode `{}`", other)),
        })
    }
}
