use logos::Logos;

#[derive(Debug, PartialEq, Logos, Clone, Copy)]
pub enum Token {
    #[regex(r"[ \f\r\t\v]+")]
    WhiteSpace,

    #[token("tx")]
    Tx,

    #[token("end")]
    End,

    #[token("balance")]
    #[token("bal")]
    Balance,

    #[token("treebal")]
    TreeBal,

    #[token("unit")]
    Unit,

    #[token("disable")]
    Disable,

    #[token("account")]
    AccountDef,

    #[token("meta")]
    Meta,

    #[regex(r"#[^\n]*")]
    Comment,

    #[token("\n")]
    NewLine,

    #[regex(r#""(\\[^\n]|[^"\\\n])*""#)]
    String,

    #[regex(r"\d\d\d\d-\d\d-\d\d")]
    Date,

    // either colon-separated, or a single segment with a lowercase letter
    // after the initial uppercase one
    #[regex(r"[A-Z][A-Za-z0-9_]*(:[A-Za-z0-9_]+)+")]
    #[regex(r"[A-Z][A-Za-z0-9_]*[a-z][A-Za-z0-9_]*")]
    Account,

    #[regex(r"[A-Z]+")]
    UnitSymbol,

    #[regex(r"-?\d[\d,]*(\.\d*)?")]
    Decimal,

    // lexical-error recovery: any other non-whitespace run is consumed as a
    // single illegal token and scanning resumes at the next whitespace
    #[regex(r"\S+", priority = 0)]
    Illegal,

    #[error]
    Error,
}
