use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::rc::Rc;

use gal_core::{GalError, JumpKind, Statement};
use gal_parser::Paragraph;

use crate::collab::FileAccess;

/// One statically-reachable point of execution: a line in a file, qualified
/// by the call stack that leads there. The same line reached through two
/// different `[Call]` sites is two positions, which is what lets `[Return]`
/// resolve to the right caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub file: String,
    pub line: usize,
    pub call_stack: Vec<Position>,
}

impl Position {
    pub fn new(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
            call_stack: Vec::new(),
        }
    }

    fn with(&self, line: usize) -> Self {
        Self {
            file: self.file.clone(),
            line,
            call_stack: self.call_stack.clone(),
        }
    }

    fn with_file(&self, file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
            call_stack: self.call_stack.clone(),
        }
    }

    fn next_line(&self) -> Self {
        self.with(self.line + 1)
    }

    fn push(mut self, top: Self) -> Self {
        self.call_stack.push(top);
        self
    }
}

/// Whole-program reachability over the static jump structure. Expressions
/// are not evaluated: every branch of a `[Select]`/`[Switch]` counts as
/// taken, `[Jump] %link` leaves the program, and calls are tracked with
/// their stacks so returns go back to the right site.
pub struct Analyser {
    files: Rc<dyn FileAccess>,
    paragraphs: HashMap<String, Rc<Paragraph>>,
    nodes: Vec<Position>,
    nexts: Vec<BTreeSet<usize>>,
    index: HashMap<Position, usize>,
}

impl std::fmt::Debug for Analyser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyser")
            .field("nodes", &self.nodes)
            .finish_non_exhaustive()
    }
}

impl Analyser {
    fn new(files: Rc<dyn FileAccess>) -> Self {
        Self {
            files,
            paragraphs: HashMap::new(),
            nodes: Vec::new(),
            nexts: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn paragraph(&mut self, file: &str) -> Result<Rc<Paragraph>, GalError> {
        if let Some(paragraph) = self.paragraphs.get(file) {
            return Ok(Rc::clone(paragraph));
        }
        let resolved = self.files.resolve(file)?;
        let content = self.files.read(&resolved).map_err(|error| {
            GalError::new(
                "FILE_OPEN",
                format!("Cannot open file {}: {}", resolved, error.message),
            )
        })?;
        let paragraph = Rc::new(Paragraph::parse(&content)?);
        self.paragraphs
            .insert(file.to_string(), Rc::clone(&paragraph));
        Ok(paragraph)
    }

    fn intern(&mut self, position: Position) -> usize {
        if let Some(&node) = self.index.get(&position) {
            return node;
        }
        let node = self.nodes.len();
        self.index.insert(position.clone(), node);
        self.nodes.push(position);
        self.nexts.push(BTreeSet::new());
        node
    }

    fn successors(&mut self, position: &Position) -> Result<Vec<Position>, GalError> {
        let paragraph = self.paragraph(&position.file)?;
        if position.line >= paragraph.len() {
            return Ok(Vec::new());
        }
        let fallthrough = |position: &Position| {
            if position.line >= paragraph.len() - 1 {
                Vec::new()
            } else {
                vec![position.next_line()]
            }
        };
        let Some(statement) = paragraph.statement_at(position.line) else {
            return Ok(fallthrough(position));
        };
        match statement {
            Statement::Jump { kind, target } => match kind {
                JumpKind::Anchor => {
                    let anchor_pos = paragraph.find_anchor_pos(target).ok_or_else(|| {
                        GalError::new(
                            "JUMP_ANCHOR",
                            format!(
                                "Anchor not found: {} ({} line {})",
                                target, position.file, position.line
                            ),
                        )
                    })?;
                    Ok(vec![position.with(anchor_pos)])
                }
                JumpKind::File => Ok(vec![position.with_file(target.clone(), 0)]),
                JumpKind::Link => Ok(Vec::new()),
            },
            Statement::Select | Statement::Switch { .. } => {
                let block = paragraph
                    .find_start_control_block(position.line)
                    .ok_or_else(|| {
                        GalError::new(
                            "ANALYSE_BLOCK",
                            format!(
                                "No control block at {} line {}",
                                position.file, position.line
                            ),
                        )
                    })?;
                Ok(block
                    .cases_pos_list
                    .iter()
                    .map(|&case_pos| position.with(case_pos + 1))
                    .collect())
            }
            Statement::Case(_) => {
                let block = paragraph
                    .find_case_control_block(position.line)
                    .ok_or_else(|| {
                        GalError::new(
                            "ANALYSE_BLOCK",
                            format!(
                                "[Case] outside control block at {} line {}",
                                position.file, position.line
                            ),
                        )
                    })?;
                Ok(vec![position.with(block.next(position.line))])
            }
            Statement::Func { .. } => {
                let return_pos = paragraph.find_return_pos_after(position.line)?;
                Ok(vec![position.with(return_pos + 1)])
            }
            Statement::Call { name, .. } => {
                let func_pos = paragraph.find_func_pos(name).ok_or_else(|| {
                    GalError::new(
                        "CALL_UNKNOWN",
                        format!("No such func: {} ({} line {})", name, position.file, position.line),
                    )
                })?;
                Ok(vec![position.with(func_pos + 1).push(position.clone())])
            }
            Statement::Return { .. } => {
                let top = position.call_stack.last().ok_or_else(|| {
                    GalError::new(
                        "ANALYSE_RETURN",
                        format!(
                            "[Return] outside any call at {} line {}",
                            position.file, position.line
                        ),
                    )
                })?;
                Ok(vec![top.next_line()])
            }
            _ => Ok(fallthrough(position)),
        }
    }

    fn run(&mut self, root: Position) -> Result<(), GalError> {
        let mut pending = VecDeque::new();
        let mut visited = HashSet::new();
        pending.push_back(self.intern(root));
        while let Some(node) = pending.pop_front() {
            if !visited.insert(node) {
                continue;
            }
            let position = self.nodes[node].clone();
            for successor in self.successors(&position)? {
                let next = self.intern(successor);
                self.nexts[node].insert(next);
                if !visited.contains(&next) {
                    pending.push_back(next);
                }
            }
        }
        Ok(())
    }

    pub fn positions(&self) -> &[Position] {
        &self.nodes
    }

    /// Lines of `file` reachable under at least one call stack.
    pub fn reachable_lines(&self, file: &str) -> BTreeSet<usize> {
        self.nodes
            .iter()
            .filter(|position| position.file == file)
            .map(|position| position.line)
            .collect()
    }

    pub fn analysed_files(&self) -> BTreeSet<&str> {
        self.nodes
            .iter()
            .map(|position| position.file.as_str())
            .collect()
    }

    /// Non-blank lines of `file` that no execution path reaches.
    pub fn unreachable_lines(&mut self, file: &str) -> Result<Vec<usize>, GalError> {
        let paragraph = self.paragraph(file)?;
        let reachable = self.reachable_lines(file);
        Ok((0..paragraph.len())
            .filter(|line| !reachable.contains(line))
            .filter(|&line| !matches!(paragraph.statement_at(line), Some(Statement::Empty)))
            .collect())
    }

    /// One line per position: `[line] @file +{successor lines} [stack lines]`.
    pub fn summary(&self) -> String {
        let mut order = (0..self.nodes.len()).collect::<Vec<_>>();
        order.sort_by(|&x, &y| self.nodes[x].cmp(&self.nodes[y]));
        order
            .iter()
            .map(|&node| {
                let position = &self.nodes[node];
                let nexts = self.nexts[node]
                    .iter()
                    .map(|&next| self.nodes[next].line.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                let stack = position
                    .call_stack
                    .iter()
                    .map(|caller| caller.line.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "[{}] @{} +{{{}}} [{}]",
                    position.line, position.file, nexts, stack
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Builds the full reachability graph starting at line 0 of `root`.
pub fn analyse(root: &str, files: Rc<dyn FileAccess>) -> Result<Analyser, GalError> {
    let mut analyser = Analyser::new(files);
    analyser.run(Position::new(root, 0))?;
    Ok(analyser)
}

#[cfg(test)]
mod analyse_tests {
    use std::collections::BTreeMap;

    use super::*;

    struct MemoryFiles(BTreeMap<String, String>);

    impl FileAccess for MemoryFiles {
        fn read(&self, path: &str) -> Result<String, GalError> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| GalError::new("FILE_READ", format!("No such file: {}", path)))
        }
        fn write(&self, path: &str, _text: &str) -> Result<(), GalError> {
            Err(GalError::new(
                "FILE_WRITE",
                format!("Read-only storage: {}", path),
            ))
        }
        fn list(&self, _dir: &str) -> Result<Vec<String>, GalError> {
            Ok(self.0.keys().cloned().collect())
        }
        fn resolve(&self, relative: &str) -> Result<String, GalError> {
            Ok(relative.to_string())
        }
    }

    fn analyse_scripts(root: &str, scripts: &[(&str, &str)]) -> Result<Analyser, GalError> {
        let files = Rc::new(MemoryFiles(
            scripts
                .iter()
                .map(|(name, text)| (name.to_string(), text.to_string()))
                .collect(),
        ));
        analyse(root, files)
    }

    #[test]
    fn linear_scripts_reach_every_line() {
        let analyser = analyse_scripts("a.txt", &[("a.txt", "A: one\nB: two\nC: three")])
            .expect("analysis passes");
        assert_eq!(
            analyser.reachable_lines("a.txt"),
            BTreeSet::from([0, 1, 2])
        );
    }

    #[test]
    fn code_between_jump_and_anchor_is_unreachable() {
        let mut analyser = analyse_scripts(
            "a.txt",
            &[("a.txt", "[Jump] skip\nA: dead\n[Anchor] skip\nA: alive")],
        )
        .expect("analysis passes");
        assert_eq!(
            analyser.unreachable_lines("a.txt").expect("file is cached"),
            vec![1]
        );
    }

    #[test]
    fn every_select_branch_is_taken() {
        let analyser = analyse_scripts(
            "a.txt",
            &[(
                "a.txt",
                "[Select]\n[Case] Yes\nA: yes\n[Break]\n[Case] No\nA: no\n[End]\nB: after",
            )],
        )
        .expect("analysis passes");
        // The `[Case]` line itself is entered only on fallthrough from the
        // previous body; the select edges go straight to the bodies.
        assert_eq!(
            analyser.reachable_lines("a.txt"),
            BTreeSet::from([0, 2, 3, 4, 5, 6, 7])
        );
    }

    #[test]
    fn file_jumps_cross_into_the_target() {
        let analyser = analyse_scripts(
            "a.txt",
            &[("a.txt", "A: hi\n[Jump] >b.txt"), ("b.txt", "B: there")],
        )
        .expect("analysis passes");
        assert_eq!(analyser.reachable_lines("b.txt"), BTreeSet::from([0]));
        assert_eq!(
            analyser.analysed_files(),
            BTreeSet::from(["a.txt", "b.txt"])
        );
    }

    #[test]
    fn links_leave_the_program() {
        let mut analyser =
            analyse_scripts("a.txt", &[("a.txt", "[Jump] %https://x\nA: dead")])
                .expect("analysis passes");
        assert_eq!(
            analyser.unreachable_lines("a.txt").expect("file is cached"),
            vec![1]
        );
    }

    #[test]
    fn returns_resolve_per_call_site() {
        let script = "[Call] f()\n[Call] f()\n[Pause]\n[Func] f()\n[Return]";
        let analyser = analyse_scripts("a.txt", &[("a.txt", script)]).expect("analysis passes");
        // The func body is visited once per call site, with distinct stacks.
        let body_positions = analyser
            .positions()
            .iter()
            .filter(|position| position.line == 4)
            .collect::<Vec<_>>();
        assert_eq!(body_positions.len(), 2);
        let callers = body_positions
            .iter()
            .map(|position| position.call_stack.last().expect("stack has a caller").line)
            .collect::<BTreeSet<_>>();
        assert_eq!(callers, BTreeSet::from([0, 1]));
        assert_eq!(
            analyser.reachable_lines("a.txt"),
            BTreeSet::from([0, 1, 2, 3, 4, 5])
        );
    }

    #[test]
    fn missing_anchors_fail_the_analysis() {
        let error = analyse_scripts("a.txt", &[("a.txt", "[Jump] nowhere")])
            .expect_err("anchor is missing");
        assert_eq!(error.code, "JUMP_ANCHOR");
    }

    #[test]
    fn switch_cases_chain_to_the_next_case() {
        let script = "[Switch] 1\n[Case] 1\nA: one\n[Case] 2\nA: two\n[End]";
        let analyser = analyse_scripts("a.txt", &[("a.txt", script)]).expect("analysis passes");
        assert_eq!(
            analyser.reachable_lines("a.txt"),
            BTreeSet::from([0, 2, 3, 4, 5])
        );
        let report = analyser.summary();
        assert!(report.contains("[0] @a.txt"));
    }
}
