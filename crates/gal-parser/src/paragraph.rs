use gal_core::{GalError, Statement};

use crate::line::parse_line;

/// A `[Select]`/`[Switch]` ... `[End]` region. Positions are 0-based line
/// indexes into the owning paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlBlock {
    pub start_pos: usize,
    pub cases_pos_list: Vec<usize>,
    pub end_pos: usize,
}

impl ControlBlock {
    /// The first position after the body of the case at `case_pos`: the next
    /// case in this block, or the closing `[End]`.
    pub fn next(&self, case_pos: usize) -> usize {
        self.cases_pos_list
            .iter()
            .copied()
            .find(|&pos| pos > case_pos)
            .unwrap_or(self.end_pos)
    }
}

/// One parsed script file: the statement per line, plus the control blocks
/// resolved by a stack scan at parse time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Paragraph {
    pub statements: Vec<Statement>,
    blocks: Vec<ControlBlock>,
}

impl Paragraph {
    pub fn parse(text: &str) -> Result<Self, GalError> {
        let mut statements = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let statement = parse_line(line).map_err(|error| {
                GalError::new(
                    error.code,
                    format!("Line {}: {}", index + 1, error.message),
                )
            })?;
            statements.push(statement);
        }
        let blocks = scan_control_blocks(&statements)?;
        Ok(Self { statements, blocks })
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn statement_at(&self, pos: usize) -> Option<&Statement> {
        self.statements.get(pos)
    }

    pub fn control_blocks(&self) -> &[ControlBlock] {
        &self.blocks
    }

    /// The block opened by the `[Select]`/`[Switch]` at `pos`.
    pub fn find_start_control_block(&self, pos: usize) -> Option<&ControlBlock> {
        self.blocks.iter().find(|block| block.start_pos == pos)
    }

    /// The block owning the `[Case]` at `case_pos`.
    pub fn find_case_control_block(&self, case_pos: usize) -> Option<&ControlBlock> {
        self.blocks
            .iter()
            .find(|block| block.cases_pos_list.contains(&case_pos))
    }

    /// The nearest `[Case]` at or before `pos`. `[Break]` resolves its target
    /// block through this.
    pub fn case_pos_at(&self, pos: usize) -> Option<usize> {
        self.statements
            .iter()
            .take(pos + 1)
            .rposition(|statement| matches!(statement, Statement::Case(_)))
    }

    /// Whether the case at `case_pos` belongs to a `[Switch]` block rather
    /// than a `[Select]` one.
    pub fn is_switch_case(&self, case_pos: usize) -> bool {
        self.find_case_control_block(case_pos)
            .and_then(|block| self.statements.get(block.start_pos))
            .is_some_and(|statement| matches!(statement, Statement::Switch { .. }))
    }

    pub fn find_anchor_pos(&self, name: &str) -> Option<usize> {
        self.statements.iter().position(
            |statement| matches!(statement, Statement::Anchor { name: anchor } if anchor == name),
        )
    }

    pub fn find_func_pos(&self, name: &str) -> Option<usize> {
        self.statements.iter().position(
            |statement| matches!(statement, Statement::Func { name: func, .. } if func == name),
        )
    }

    /// The first `[Return]` strictly after `pos`. A `[Func]` body must end
    /// with one.
    pub fn find_return_pos_after(&self, pos: usize) -> Result<usize, GalError> {
        self.statements
            .iter()
            .enumerate()
            .skip(pos + 1)
            .find(|(_, statement)| matches!(statement, Statement::Return { .. }))
            .map(|(index, _)| index)
            .ok_or_else(|| {
                GalError::new(
                    "PARSE_NO_RETURN",
                    format!("No return statement found after line {}", pos + 1),
                )
            })
    }

    /// All `[Enum]` declarations at lines up to and including `pos`, in file
    /// order. Enum types are rebuilt from these on every position change.
    pub fn scan_enums_at(&self, pos: usize) -> Vec<(&str, &[String])> {
        self.statements
            .iter()
            .take(pos + 1)
            .filter_map(|statement| match statement {
                Statement::Enum { name, values } => Some((name.as_str(), values.as_slice())),
                _ => None,
            })
            .collect()
    }

    /// All `[Var]` assignments at lines up to and including `pos`.
    pub fn scan_vars_at(&self, pos: usize) -> Vec<(&str, &str)> {
        self.statements
            .iter()
            .take(pos + 1)
            .filter_map(|statement| match statement {
                Statement::Var { name, expr } => Some((name.as_str(), expr.as_str())),
                _ => None,
            })
            .collect()
    }

    /// The label of the nearest `[Part]` at or before `pos`, if any.
    pub fn part_at(&self, pos: usize) -> Option<&str> {
        self.statements
            .iter()
            .take(pos + 1)
            .rev()
            .find_map(|statement| match statement {
                Statement::Part { label } => Some(label.as_str()),
                _ => None,
            })
    }
}

fn scan_control_blocks(statements: &[Statement]) -> Result<Vec<ControlBlock>, GalError> {
    let mut finished = Vec::new();
    let mut open: Vec<(usize, Vec<usize>)> = Vec::new();
    for (pos, statement) in statements.iter().enumerate() {
        match statement {
            _ if statement.opens_control_block() => open.push((pos, Vec::new())),
            Statement::Case(_) => match open.last_mut() {
                Some((_, cases)) => cases.push(pos),
                None => {
                    return Err(GalError::new(
                        "PARSE_CASE_OUTSIDE",
                        format!("Line {}: case outside of a control block", pos + 1),
                    ))
                }
            },
            Statement::End => match open.pop() {
                Some((start_pos, cases_pos_list)) => finished.push(ControlBlock {
                    start_pos,
                    cases_pos_list,
                    end_pos: pos,
                }),
                None => {
                    return Err(GalError::new(
                        "PARSE_EXTRA_END",
                        format!("Line {}: end without a matching select or switch", pos + 1),
                    ))
                }
            },
            _ => {}
        }
    }
    if let Some((start_pos, _)) = open.last() {
        return Err(GalError::new(
            "PARSE_UNCLOSED_BLOCK",
            format!("Line {}: control block is never closed", start_pos + 1),
        ));
    }
    finished.sort_by_key(|block| block.start_pos);
    Ok(finished)
}
