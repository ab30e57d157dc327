//! 構文木と括弧表記リーダーのモジュール。
//!
//! Penn Treebank 形式の括弧表記 `(S (NP (DT the) (NN cat)) (VP (VBZ sleeps)))`
//! を読み込み、[`Node`] の列として返します。

use std::io::BufRead;

use crate::errors::{Result, UnitRulesError};

/// 空要素を表すラベル。
const EMPTY_ELEMENT: &str = "-NONE-";

/// 構文木のノード。
///
/// 終端記号(単語)は子を持たず、内部ノードはラベルと順序付きの子を持ちます。
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Node {
    /// 単語
    Terminal {
        /// 表層形
        token: String,
    },
    /// 非終端記号
    Internal {
        /// カテゴリ名
        label: String,
        /// 子ノード
        children: Vec<Node>,
    },
}

impl Node {
    /// 終端ノードを作成します。
    pub fn terminal<S>(token: S) -> Self
    where
        S: Into<String>,
    {
        Self::Terminal {
            token: token.into(),
        }
    }

    /// 内部ノードを作成します。
    pub fn internal<S>(label: S, children: Vec<Node>) -> Self
    where
        S: Into<String>,
    {
        Self::Internal {
            label: label.into(),
            children,
        }
    }

    /// 既定のオプションで括弧表記の木を1つ読み込みます。
    ///
    /// # エラー
    ///
    /// 入力に木が含まれない場合、構文が不正な場合、木の後ろに空白以外の入力が
    /// 続く場合は [`UnitRulesError`] が返されます。
    pub fn parse(s: &str) -> Result<Self> {
        let mut rdr = TreeReader::new(s.as_bytes());
        let tree = rdr
            .next()
            .unwrap_or_else(|| Err(malformed("no tree found".to_string())))?;
        if rdr.next().is_some() {
            return Err(malformed(format!(
                "trailing input after the tree at line {}",
                rdr.line_no()
            )));
        }
        Ok(tree)
    }

    /// 内部ノードであればラベルを返します。
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Terminal { .. } => None,
            Self::Internal { label, .. } => Some(label),
        }
    }

    /// 子ノードのスライスを返します。終端ノードでは空です。
    pub fn children(&self) -> &[Node] {
        match self {
            Self::Terminal { .. } => &[],
            Self::Internal { children, .. } => children,
        }
    }

    /// 終端ノードであれば `true` を返します。
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal { .. })
    }
}

impl Drop for Node {
    // 深い木でもスタックを使い切らないように、子孫を平坦に解放する
    fn drop(&mut self) {
        let mut stack = match self {
            Self::Internal { children, .. } => std::mem::take(children),
            Self::Terminal { .. } => return,
        };
        while let Some(mut node) = stack.pop() {
            if let Self::Internal { children, .. } = &mut node {
                stack.append(children);
            }
        }
    }
}

/// [`TreeReader`] の設定。
#[derive(Clone, Debug)]
pub struct TreeReaderOptions {
    root_label: String,
    strip_function_tags: bool,
    remove_empty_elements: bool,
}

impl Default for TreeReaderOptions {
    fn default() -> Self {
        Self {
            root_label: "ROOT".to_string(),
            strip_function_tags: true,
            remove_empty_elements: true,
        }
    }
}

impl TreeReaderOptions {
    /// ラベルのない最外括弧 `( (S ...) )` に付けるラベルを指定します。
    ///
    /// デフォルトは `ROOT` です。
    pub fn root_label<S>(mut self, label: S) -> Self
    where
        S: Into<String>,
    {
        self.root_label = label.into();
        self
    }

    /// `NP-SBJ-1` や `PP=2` のような機能タグと添字を取り除くかを指定します。
    ///
    /// `-NONE-` のように `-` で始まるラベルはそのまま残ります。デフォルトは `true` です。
    pub fn strip_function_tags(mut self, yes: bool) -> Self {
        self.strip_function_tags = yes;
        self
    }

    /// `-NONE-` の部分木を取り除くかを指定します。
    ///
    /// 取り除いた結果、子を失った内部ノードも併せて取り除かれます。デフォルトは `true` です。
    pub fn remove_empty_elements(mut self, yes: bool) -> Self {
        self.remove_empty_elements = yes;
        self
    }
}

enum Token {
    Open,
    Close,
    Atom(String),
}

struct Frame {
    label: Option<String>,
    children: Vec<Node>,
    // 空要素として取り除かれた子も含めて、子を1つでも読んだか
    had_children: bool,
    line: usize,
}

impl Frame {
    fn new(line: usize) -> Self {
        Self {
            label: None,
            children: vec![],
            had_children: false,
            line,
        }
    }
}

/// 括弧表記の木を順に読み込むイテレータ。
///
/// トップレベルの括弧式1つにつき1つの木を返します。構文が壊れた式は
/// [`UnitRulesError::InvalidFormat`] としてその式だけが報告され、
/// 次のトップレベルの `(` から読み込みが再開されます。
/// UTF-8として解釈できない行を含む式も、構文が壊れた式として扱われます。
/// I/Oエラーが発生した場合、以降の読み込みは行われません。
pub struct TreeReader<R> {
    rdr: R,
    options: TreeReaderOptions,
    buf: Vec<u8>,
    line: String,
    line_invalid: bool,
    pos: usize,
    line_no: usize,
    done: bool,
}

impl<R> TreeReader<R>
where
    R: BufRead,
{
    /// 既定の設定でリーダーを作成します。
    pub fn new(rdr: R) -> Self {
        Self::with_options(rdr, TreeReaderOptions::default())
    }

    /// 設定を指定してリーダーを作成します。
    pub fn with_options(rdr: R, options: TreeReaderOptions) -> Self {
        Self {
            rdr,
            options,
            buf: vec![],
            line: String::new(),
            line_invalid: false,
            pos: 0,
            line_no: 0,
            done: false,
        }
    }

    /// 直前に読んだ行の番号(1始まり)を返します。
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    fn next_token(&mut self) -> Result<Option<(Token, usize)>> {
        loop {
            let rest = &self.line[self.pos..];
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();

            let Some(c) = trimmed.chars().next() else {
                self.line.clear();
                self.pos = 0;
                self.buf.clear();
                if self.rdr.read_until(b'\n', &mut self.buf)? == 0 {
                    return Ok(None);
                }
                self.line_no += 1;
                match std::str::from_utf8(&self.buf) {
                    Ok(line) => {
                        self.line.push_str(line);
                        self.line_invalid = false;
                    }
                    Err(_) => {
                        self.line.push_str(&String::from_utf8_lossy(&self.buf));
                        self.line_invalid = true;
                    }
                }
                continue;
            };

            let token = match c {
                '(' => {
                    self.pos += 1;
                    Token::Open
                }
                ')' => {
                    self.pos += 1;
                    Token::Close
                }
                _ => {
                    let len = trimmed
                        .find(|c: char| c.is_whitespace() || c == '(' || c == ')')
                        .unwrap_or(trimmed.len());
                    self.pos += len;
                    Token::Atom(trimmed[..len].to_string())
                }
            };
            return Ok(Some((token, self.line_no)));
        }
    }

    fn normalize_label(&self, label: String) -> String {
        if !self.options.strip_function_tags || label.starts_with('-') {
            return label;
        }
        match label.find(['-', '=']) {
            Some(end) if end > 0 => label[..end].to_string(),
            _ => label,
        }
    }

    /// 閉じ括弧に対応するノードを組み立てます。
    ///
    /// 空要素として取り除かれた場合は `Ok(None)` を返します。
    fn close_frame(&self, frame: Frame, is_root: bool) -> Result<Option<Node>, String> {
        let label = match frame.label {
            Some(label) => label,
            None if is_root => self.options.root_label.clone(),
            None => return Err(format!("missing label at line {}", frame.line)),
        };
        if self.options.remove_empty_elements && label == EMPTY_ELEMENT {
            return Ok(None);
        }
        if frame.children.is_empty() {
            if self.options.remove_empty_elements && frame.had_children {
                // 子がすべて空要素だった
                return Ok(None);
            }
            return Err(format!("empty constituent `{label}` at line {}", frame.line));
        }
        Ok(Some(Node::internal(self.normalize_label(label), frame.children)))
    }

    fn read_tree(&mut self, start_line: usize) -> Result<Node> {
        let mut stack = vec![Frame::new(start_line)];
        let mut error = None;
        if self.line_invalid {
            error = Some(format!("invalid UTF-8 at line {start_line}"));
        }

        loop {
            let Some((token, line)) = self.next_token()? else {
                return Err(malformed(format!(
                    "unterminated tree starting at line {start_line}"
                )));
            };
            if self.line_invalid && error.is_none() {
                error = Some(format!("invalid UTF-8 at line {line}"));
            }
            match token {
                Token::Open => stack.push(Frame::new(line)),
                Token::Atom(atom) => {
                    if let Some(top) = stack.last_mut() {
                        if top.label.is_none() && top.children.is_empty() {
                            top.label = Some(atom);
                        } else {
                            top.children.push(Node::terminal(atom));
                            top.had_children = true;
                        }
                    }
                }
                Token::Close => {
                    let Some(frame) = stack.pop() else {
                        unreachable!("the root frame is popped last");
                    };
                    let is_root = stack.is_empty();
                    let node = if error.is_some() {
                        None
                    } else {
                        match self.close_frame(frame, is_root) {
                            Ok(node) => node,
                            Err(msg) => {
                                error = Some(msg);
                                None
                            }
                        }
                    };
                    match stack.last_mut() {
                        Some(parent) => {
                            parent.children.extend(node);
                            parent.had_children = true;
                        }
                        None => {
                            return match (error, node) {
                                (Some(msg), _) => Err(malformed(msg)),
                                (None, Some(node)) => Ok(node),
                                (None, None) => Err(malformed(format!(
                                    "tree starting at line {start_line} consists of empty elements only"
                                ))),
                            };
                        }
                    }
                }
            }
        }
    }
}

impl<R> Iterator for TreeReader<R>
where
    R: BufRead,
{
    type Item = Result<Node>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = match self.next_token() {
            Ok(Some((Token::Open, line))) => self.read_tree(line),
            Ok(Some((Token::Close, line))) => {
                Err(malformed(format!("unbalanced `)` at line {line}")))
            }
            Ok(Some((Token::Atom(atom), line))) => Err(malformed(format!(
                "token `{atom}` outside of brackets at line {line}"
            ))),
            Ok(None) => {
                self.done = true;
                return None;
            }
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            if !e.is_malformed_tree() {
                self.done = true;
            }
        }
        Some(result)
    }
}

fn malformed(msg: String) -> UnitRulesError {
    UnitRulesError::invalid_format("tree", msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(s: &str, options: TreeReaderOptions) -> Vec<Result<Node>> {
        TreeReader::with_options(s.as_bytes(), options).collect()
    }

    #[test]
    fn test_parse_simple() {
        let tree = Node::parse("(S (NP (DT the) (NN cat)) (VP (VBZ sleeps)))").unwrap();
        let expected = Node::internal(
            "S",
            vec![
                Node::internal(
                    "NP",
                    vec![
                        Node::internal("DT", vec![Node::terminal("the")]),
                        Node::internal("NN", vec![Node::terminal("cat")]),
                    ],
                ),
                Node::internal("VP", vec![Node::internal("VBZ", vec![Node::terminal("sleeps")])]),
            ],
        );
        assert_eq!(expected, tree);
    }

    #[test]
    fn test_multiline_and_root_label() {
        let src = "( (S\n    (NP (PRP It))\n    (VP (VBD rained))) )\n";
        let tree = Node::parse(src).unwrap();
        assert_eq!(Some("ROOT"), tree.label());
        assert_eq!(1, tree.children().len());
        assert_eq!(Some("S"), tree.children()[0].label());

        let trees = read_all(src, TreeReaderOptions::default().root_label("S1"));
        assert_eq!(Some("S1"), trees[0].as_ref().unwrap().label());
    }

    #[test]
    fn test_function_tags() {
        let src = "(S (NP-SBJ-1 (PRP He)) (VP=2 (VBD left)) (-LRB- -LRB-))";
        let tree = Node::parse(src).unwrap();
        let labels: Vec<_> = tree.children().iter().map(|n| n.label().unwrap()).collect();
        assert_eq!(vec!["NP", "VP", "-LRB-"], labels);

        let trees = read_all(src, TreeReaderOptions::default().strip_function_tags(false));
        let tree = trees[0].as_ref().unwrap();
        assert_eq!(Some("NP-SBJ-1"), tree.children()[0].label());
    }

    #[test]
    fn test_empty_elements() {
        let src = "(S (NP-SBJ (-NONE- *T*-1)) (VP (VBD left)))";
        let tree = Node::parse(src).unwrap();
        assert_eq!(
            Node::internal("S", vec![Node::internal("VP", vec![Node::internal("VBD", vec![Node::terminal("left")])])]),
            tree,
        );

        let trees = read_all(src, TreeReaderOptions::default().remove_empty_elements(false));
        let tree = trees[0].as_ref().unwrap();
        assert_eq!(2, tree.children().len());
        assert_eq!(Some("-NONE-"), tree.children()[0].children()[0].label());
    }

    #[test]
    fn test_recovery() {
        let src = "\
(S (NP (DT a)) (VP (VB b)))
) stray
(S (NP) (VP (VB c)))
(S (NP (DT d)) (VP (VB e)))
(S (NP (DT f)";
        let trees = read_all(src, TreeReaderOptions::default().remove_empty_elements(false));
        assert_eq!(6, trees.len());
        assert!(trees[0].is_ok());
        // 閉じ括弧と裸のトークン
        assert!(trees[1].as_ref().unwrap_err().is_malformed_tree());
        assert!(trees[2].as_ref().unwrap_err().is_malformed_tree());
        // 空の構成素
        assert!(trees[3].as_ref().unwrap_err().is_malformed_tree());
        assert!(trees[4].is_ok());
        // 閉じられていない木
        assert!(trees[5].as_ref().unwrap_err().is_malformed_tree());
    }

    #[test]
    fn test_empty_constituent_is_malformed() {
        let src = "(S (NP) (VP (VBD left) (NP (PRP us))))\n(S (NP (-NONE- *)) (VP (VBD left)))";
        let trees = read_all(src, TreeReaderOptions::default());
        assert_eq!(2, trees.len());
        assert!(trees[0].as_ref().unwrap_err().is_malformed_tree());
        // 空要素だけを支配していた NP は取り除かれる
        assert_eq!(1, trees[1].as_ref().unwrap().children().len());
    }

    #[test]
    fn test_invalid_utf8() {
        let src: &[u8] = b"(S (NP (DT a)) (VP (VB b)))\n(S (NP (NN caf\xe9)) (VP (VB c)))\n(S (NP (DT d)) (VP (VB e)))\n";
        let trees: Vec<_> = TreeReader::new(src).collect();
        assert_eq!(3, trees.len());
        assert!(trees[0].is_ok());
        assert!(trees[1].as_ref().unwrap_err().is_malformed_tree());
        assert!(trees[2].is_ok());
    }

    #[test]
    fn test_deep_tree() {
        let depth = 100_000;
        let src = format!("{}x{}", "(A ".repeat(depth), ")".repeat(depth));
        let tree = Node::parse(&src).unwrap();
        let mut node = &tree;
        let mut n = 1;
        while let [child @ Node::Internal { .. }] = node.children() {
            node = child;
            n += 1;
        }
        assert_eq!(depth, n);
        drop(tree);
    }

    #[test]
    fn test_parse_trailing_input() {
        assert!(Node::parse("(A x) junk").unwrap_err().is_malformed_tree());
        assert!(Node::parse("(A x) (B y)").is_err());
        assert!(Node::parse("(A x)\n  \n").is_ok());
    }

    #[test]
    fn test_missing_label() {
        let trees = read_all("(S ((DT a)))\n(S (X y))", TreeReaderOptions::default());
        assert_eq!(2, trees.len());
        assert!(trees[0].as_ref().unwrap_err().is_malformed_tree());
        assert!(trees[1].is_ok());
    }

    #[test]
    fn test_no_tree() {
        assert!(Node::parse("   \n").is_err());
        assert_eq!(0, read_all("", TreeReaderOptions::default()).len());
    }
}
