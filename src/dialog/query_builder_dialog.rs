//! QueryBuilderDialog: popup editor for compound filter expressions.
//!
//! List mode shows the filter tree with one selected node; edit mode walks a
//! single condition's field/operator/value/negation. The footer always shows
//! the live compilation of the current tree, recomputed on every draw.

use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, BorderType, Borders, Clear};
use serde_json::{Value, json};
use strum::Display as SDisplay;
use tracing::debug;

use crate::action::Action;
use crate::catalog::{
    FieldCatalog, FilterOperator, FilterType, default_operator, default_value, operator_phrase,
    operators_for, value_display,
};
use crate::components::Component;
use crate::components::dialog_layout::split_dialog_area;
use crate::config::{Config, Mode};
use crate::query::model::{BoolOperator, node_id};
use crate::query::{CompiledQuery, ConditionPatch, GroupPatch, Query, compile};

/// Dialog mode: tree view, condition editor, or the save/load prompts
#[derive(Debug, Clone, PartialEq, Eq, SDisplay)]
pub enum QueryBuilderMode {
    List,
    EditCondition,
    SaveQuery,
    LoadQuery,
}

/// Which part of a condition the editor is focused on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditFocus {
    Field,
    Operator,
    Value,
    Negated,
}

impl EditFocus {
    fn next(self) -> Self {
        match self {
            EditFocus::Field => EditFocus::Operator,
            EditFocus::Operator => EditFocus::Value,
            EditFocus::Value => EditFocus::Negated,
            EditFocus::Negated => EditFocus::Field,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Group,
    Condition,
}

/// One row of the flattened tree rendering.
#[derive(Debug, Clone)]
struct NodeLine {
    id: String,
    parent_id: Option<String>,
    /// Combined index among the parent's conditions-then-groups
    index_in_parent: usize,
    depth: usize,
    kind: NodeKind,
    text: String,
}

/// A named, JSON-serialized query in the transient save list.
#[derive(Debug, Clone)]
pub struct SavedQuery {
    pub id: String,
    pub name: String,
    pub json: String,
}

/// Scratch state of the condition editor.
#[derive(Debug, Clone)]
struct EditState {
    condition_id: String,
    focus: EditFocus,
    field_index: usize,
    operator_index: usize,
    value_buffer: String,
    option_index: usize,
    negated: bool,
}

pub struct QueryBuilderDialog {
    pub query: Query,
    catalog: FieldCatalog,
    pub mode: QueryBuilderMode,
    selected: usize,
    scroll_offset: usize,
    edit: Option<EditState>,
    saved: Vec<SavedQuery>,
    load_index: usize,
    name_buffer: String,
    show_instructions: bool,
    config: Config,
}

impl QueryBuilderDialog {
    pub fn new(catalog: FieldCatalog) -> Self {
        let query = Query::with_default_condition(&catalog);
        Self {
            query,
            catalog,
            mode: QueryBuilderMode::List,
            selected: 0,
            scroll_offset: 0,
            edit: None,
            saved: Vec::new(),
            load_index: 0,
            name_buffer: String::new(),
            show_instructions: true,
            config: Config::default(),
        }
    }

    pub fn compiled(&self) -> CompiledQuery {
        compile(&self.query, &self.catalog)
    }

    pub fn saved_queries(&self) -> &[SavedQuery] {
        &self.saved
    }

    /// Flatten the tree depth-first: each group renders itself, then its
    /// conditions, then its child groups.
    fn flatten(&self) -> Vec<NodeLine> {
        fn walk(
            group: &crate::query::FilterGroup,
            parent: Option<&str>,
            index_in_parent: usize,
            depth: usize,
            catalog: &FieldCatalog,
            out: &mut Vec<NodeLine>,
        ) {
            let negation = if group.negated { "לא " } else { "" };
            out.push(NodeLine {
                id: group.id.clone(),
                parent_id: parent.map(str::to_string),
                index_in_parent,
                depth,
                kind: NodeKind::Group,
                text: format!("{negation}קבוצה [{}]", group.operator),
            });
            for (i, condition) in group.conditions.iter().enumerate() {
                let label = catalog.field_label(&condition.field);
                let phrase = operator_phrase(condition.operator);
                let value = value_display(&condition.value);
                let negation = if condition.negated { "לא " } else { "" };
                out.push(NodeLine {
                    id: condition.id.clone(),
                    parent_id: Some(group.id.to_string()),
                    index_in_parent: i,
                    depth: depth + 1,
                    kind: NodeKind::Condition,
                    text: format!("{label} {negation}{phrase} {value}"),
                });
            }
            let condition_count = group.conditions.len();
            for (i, child) in group.groups.iter().enumerate() {
                walk(child, Some(&group.id), condition_count + i, depth + 1, catalog, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.query.root_group, None, 0, 0, &self.catalog, &mut out);
        out
    }

    fn selected_line(&self) -> Option<NodeLine> {
        self.flatten().into_iter().nth(self.selected)
    }

    /// The group a new node should be added to: the selected group, or the
    /// parent group of a selected condition.
    fn target_group_id(&self) -> Option<String> {
        let line = self.selected_line()?;
        match line.kind {
            NodeKind::Group => Some(line.id),
            NodeKind::Condition => line.parent_id,
        }
    }

    fn clamp_selection(&mut self, max_rows: usize) {
        let len = self.flatten().len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
        if self.selected < self.scroll_offset {
            self.scroll_offset = self.selected;
        } else if max_rows > 0 && self.selected >= self.scroll_offset + max_rows {
            self.scroll_offset = self.selected + 1 - max_rows;
        }
    }

    fn take_query(&mut self) -> Query {
        std::mem::take(&mut self.query)
    }

    fn add_condition(&mut self) {
        if let Some(group_id) = self.target_group_id() {
            let query = self.take_query();
            self.query = query.add_condition(&group_id, &self.catalog);
        }
    }

    fn add_group(&mut self) {
        if let Some(group_id) = self.target_group_id() {
            let query = self.take_query();
            self.query = query.add_group(&group_id);
        }
    }

    fn delete_selected(&mut self) {
        let Some(line) = self.selected_line() else { return };
        let query = self.take_query();
        self.query = match line.kind {
            NodeKind::Condition => query.remove_condition(&line.id),
            // The root has no parent and stays put.
            NodeKind::Group => query.remove_group(&line.id),
        };
    }

    fn toggle_group_operator(&mut self) {
        let Some(line) = self.selected_line() else { return };
        let group_id = match line.kind {
            NodeKind::Group => line.id,
            NodeKind::Condition => match line.parent_id {
                Some(id) => id,
                None => return,
            },
        };
        let current = group_operator(&self.query.root_group, &group_id);
        let Some(current) = current else { return };
        let flipped =
            if current == BoolOperator::And { BoolOperator::Or } else { BoolOperator::And };
        let query = self.take_query();
        self.query = query
            .update_group(&group_id, GroupPatch { operator: Some(flipped), ..Default::default() });
    }

    /// Toggle the connective rendered before the selected node, which is the
    /// gap between it and its previous sibling.
    fn toggle_gap_operator(&mut self) {
        let Some(line) = self.selected_line() else { return };
        let Some(parent_id) = line.parent_id else { return };
        if line.index_in_parent == 0 {
            return;
        }
        let gap = line.index_in_parent - 1;
        let Some(parent) = find_group(&self.query.root_group, &parent_id).cloned() else { return };
        let mut parent = parent;
        parent.materialize_child_operators();
        let mut ops = parent.child_operators.unwrap_or_default();
        if let Some(op) = ops.get_mut(gap) {
            *op = if *op == BoolOperator::And { BoolOperator::Or } else { BoolOperator::And };
        }
        let query = self.take_query();
        self.query = query.update_group(
            &parent_id,
            GroupPatch { child_operators: Some(ops), ..Default::default() },
        );
    }

    fn toggle_negated(&mut self) {
        let Some(line) = self.selected_line() else { return };
        let query = self.take_query();
        self.query = match line.kind {
            NodeKind::Group => {
                let negated = find_group(&query.root_group, &line.id).map(|g| g.negated);
                match negated {
                    Some(n) => query.update_group(
                        &line.id,
                        GroupPatch { negated: Some(!n), ..Default::default() },
                    ),
                    None => query,
                }
            }
            NodeKind::Condition => {
                let negated = find_condition(&query.root_group, &line.id).map(|c| c.negated);
                match negated {
                    Some(n) => query.update_condition(
                        &line.id,
                        ConditionPatch { negated: Some(!n), ..Default::default() },
                    ),
                    None => query,
                }
            }
        };
    }

    fn reset_query(&mut self) {
        self.query = Query::with_default_condition(&self.catalog);
        self.selected = 0;
        self.scroll_offset = 0;
    }

    /// Enter the condition editor for the selected condition.
    fn begin_edit(&mut self) {
        let Some(line) = self.selected_line() else { return };
        if line.kind != NodeKind::Condition {
            return;
        }
        let Some(condition) = find_condition(&self.query.root_group, &line.id) else { return };
        // No catalog fields means nothing to cycle or commit against.
        if self.catalog.fields.is_empty() {
            return;
        }
        let field_index = self
            .catalog
            .fields
            .iter()
            .position(|f| f.value == condition.field)
            .unwrap_or(0);
        let operator_index = operators_for(condition.field_type)
            .iter()
            .position(|op| *op == condition.operator)
            .unwrap_or(0);
        let option_index = self
            .catalog
            .find_field(&condition.field)
            .and_then(|f| f.options.as_ref())
            .and_then(|opts| opts.iter().position(|o| o.value == condition.value))
            .unwrap_or(0);
        self.edit = Some(EditState {
            condition_id: line.id,
            focus: EditFocus::Field,
            field_index,
            operator_index,
            value_buffer: buffer_from_value(&condition.value),
            option_index,
            negated: condition.negated,
        });
        self.mode = QueryBuilderMode::EditCondition;
    }

    /// Move the editor to a different catalog field. When the new field's
    /// type differs from the current one the operator and value are reset to
    /// the type's defaults; a same-type switch keeps them.
    fn cycle_field(&mut self, forward: bool) {
        let Some(edit) = self.edit.as_mut() else { return };
        let len = self.catalog.fields.len();
        if len == 0 {
            return;
        }
        let old_type = self.catalog.fields[edit.field_index].field_type;
        edit.field_index = if forward {
            (edit.field_index + 1) % len
        } else if edit.field_index == 0 {
            len - 1
        } else {
            edit.field_index - 1
        };
        let new_type = self.catalog.fields[edit.field_index].field_type;
        if new_type != old_type {
            edit.operator_index = 0;
            edit.value_buffer = buffer_from_value(&default_value(new_type));
            edit.option_index = 0;
        }
    }

    fn cycle_operator(&mut self, forward: bool) {
        let Some(edit) = self.edit.as_mut() else { return };
        let field_type = self.catalog.fields[edit.field_index].field_type;
        let len = operators_for(field_type).len();
        edit.operator_index = if forward {
            (edit.operator_index + 1) % len
        } else if edit.operator_index == 0 {
            len - 1
        } else {
            edit.operator_index - 1
        };
    }

    fn cycle_value(&mut self, forward: bool) {
        let Some(edit) = self.edit.as_mut() else { return };
        let field = &self.catalog.fields[edit.field_index];
        match field.field_type {
            FilterType::Boolean => {
                edit.value_buffer =
                    if edit.value_buffer == "true" { "false".into() } else { "true".into() };
            }
            FilterType::Select | FilterType::MultiSelect => {
                if let Some(options) = &field.options {
                    let len = options.len();
                    if len == 0 {
                        return;
                    }
                    edit.option_index = if forward {
                        (edit.option_index + 1) % len
                    } else if edit.option_index == 0 {
                        len - 1
                    } else {
                        edit.option_index - 1
                    };
                    edit.value_buffer = value_display(&options[edit.option_index].value);
                }
            }
            _ => {}
        }
    }

    /// Commit the editor back into the tree.
    fn commit_edit(&mut self) {
        let Some(edit) = self.edit.take() else { return };
        let field = self.catalog.fields[edit.field_index].clone();
        let operators = operators_for(field.field_type);
        let operator = operators.get(edit.operator_index).copied().unwrap_or_else(|| {
            default_operator(field.field_type)
        });
        let value = parse_value(&edit.value_buffer, field.field_type, operator);
        debug!(field = %field.value, %operator, "condition edited");
        let query = self.take_query();
        self.query = query.update_condition(
            &edit.condition_id,
            ConditionPatch {
                field: Some(field.value),
                operator: Some(operator),
                value: Some(value),
                field_type: Some(field.field_type),
                negated: Some(edit.negated),
            },
        );
        self.mode = QueryBuilderMode::List;
    }

    fn save_current(&mut self) {
        let name = self.name_buffer.trim().to_string();
        if name.is_empty() {
            self.mode = QueryBuilderMode::List;
            return;
        }
        match serde_json::to_string(&self.query) {
            Ok(json) => self.saved.push(SavedQuery { id: node_id(), name, json }),
            Err(e) => debug!("failed to serialize query: {e}"),
        }
        self.name_buffer.clear();
        self.mode = QueryBuilderMode::List;
    }

    fn load_selected(&mut self) {
        if let Some(entry) = self.saved.get(self.load_index)
            && let Ok(query) = serde_json::from_str::<Query>(&entry.json)
        {
            self.query = query;
            self.selected = 0;
            self.scroll_offset = 0;
        }
        self.mode = QueryBuilderMode::List;
    }

    fn instructions(&self) -> String {
        match self.mode {
            QueryBuilderMode::List => self.config.actions_to_instructions(&[
                (Mode::QueryBuilder, Action::AddCondition, "Add Condition"),
                (Mode::QueryBuilder, Action::AddGroup, "Add Group"),
                (Mode::QueryBuilder, Action::ToggleGroupOperator, "AND/OR"),
                (Mode::QueryBuilder, Action::ToggleGapOperator, "Gap AND/OR"),
                (Mode::QueryBuilder, Action::ToggleNegated, "NOT"),
                (Mode::QueryBuilder, Action::DeleteNode, "Delete"),
                (Mode::QueryBuilder, Action::ResetQuery, "Reset"),
                (Mode::QueryBuilder, Action::SaveQuery, "Save"),
                (Mode::QueryBuilder, Action::LoadQuery, "Load"),
                (Mode::QueryBuilder, Action::ApplyQuery, "Apply"),
                (Mode::Global, Action::Enter, "Edit"),
                (Mode::Global, Action::Escape, "Close"),
            ]),
            QueryBuilderMode::EditCondition => {
                "Tab: Next Field  Left/Right: Change  Enter: Apply  Esc: Cancel".to_string()
            }
            QueryBuilderMode::SaveQuery => "Enter: Save  Esc: Cancel".to_string(),
            QueryBuilderMode::LoadQuery => "Up/Down: Select  Enter: Load  Esc: Cancel".to_string(),
        }
    }

    fn render_list(&self, inner: Rect, buf: &mut Buffer, max_rows: usize) {
        let lines = self.flatten();
        let tree_rows = max_rows.saturating_sub(4).max(1);
        let end = (self.scroll_offset + tree_rows).min(lines.len());
        for (vis_idx, i) in (self.scroll_offset..end).enumerate() {
            let y = inner.y + vis_idx as u16;
            let line = &lines[i];
            let indent = "  ".repeat(line.depth);
            let connective = if line.index_in_parent > 0 {
                let op = line
                    .parent_id
                    .as_deref()
                    .and_then(|pid| find_group(&self.query.root_group, pid))
                    .map(|g| g.gap_operator(line.index_in_parent - 1))
                    .unwrap_or_default();
                format!("{} ", human_connective(op))
            } else {
                String::new()
            };
            let marker = if i == self.selected { "> " } else { "  " };
            let mut style = Style::default();
            if i == self.selected {
                style = style.fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD);
            } else if line.kind == NodeKind::Group {
                style = style.fg(Color::Green);
            }
            buf.set_string(inner.x, y, format!("{marker}{indent}{connective}{}", line.text), style);
        }

        // Live compilation footer
        let compiled = self.compiled();
        let footer_y = inner.y + tree_rows as u16;
        let sql = if compiled.is_empty() { "—".to_string() } else { compiled.query_string.clone() };
        let human =
            if compiled.human_readable.is_empty() { "—".to_string() } else { compiled.human_readable.clone() };
        buf.set_string(
            inner.x,
            footer_y,
            "─".repeat(inner.width as usize),
            Style::default().fg(Color::DarkGray),
        );
        buf.set_string(
            inner.x,
            footer_y + 1,
            format!("SQL: {sql}"),
            Style::default().fg(Color::Magenta),
        );
        buf.set_string(inner.x, footer_y + 2, human, Style::default().fg(Color::White));
        buf.set_string(
            inner.x,
            footer_y + 3,
            format!("{} פרמטרים", compiled.params.len()),
            Style::default().fg(Color::DarkGray),
        );
    }

    fn render_edit(&self, inner: Rect, buf: &mut Buffer) {
        let Some(edit) = &self.edit else { return };
        let field = &self.catalog.fields[edit.field_index];
        let operator = operators_for(field.field_type)
            .get(edit.operator_index)
            .copied()
            .unwrap_or_else(|| default_operator(field.field_type));
        let rows = [
            (EditFocus::Field, "שדה", field.label.clone()),
            (EditFocus::Operator, "אופרטור", operator_phrase(operator).to_string()),
            (EditFocus::Value, "ערך", format!("{}_", edit.value_buffer)),
            (EditFocus::Negated, "שלילה (NOT)", if edit.negated { "כן" } else { "לא" }.to_string()),
        ];
        for (i, (focus, label, value)) in rows.iter().enumerate() {
            let y = inner.y + i as u16;
            let marker = if *focus == edit.focus { "> " } else { "  " };
            let mut style = Style::default();
            if *focus == edit.focus {
                style = style.fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD);
            }
            buf.set_string(inner.x, y, format!("{marker}{label}: {value}"), style);
        }
        if matches!(field.field_type, FilterType::Number | FilterType::Date)
            && operator == FilterOperator::Between
        {
            buf.set_string(
                inner.x,
                inner.y + rows.len() as u16 + 1,
                "ערך תחום: מינימום,מקסימום",
                Style::default().fg(Color::DarkGray),
            );
        }
    }

    fn render_save(&self, inner: Rect, buf: &mut Buffer) {
        buf.set_string(
            inner.x,
            inner.y,
            format!("שם השאילתה: {}_", self.name_buffer),
            Style::default().fg(Color::White),
        );
    }

    fn render_load(&self, inner: Rect, buf: &mut Buffer, max_rows: usize) {
        if self.saved.is_empty() {
            buf.set_string(
                inner.x,
                inner.y,
                "אין שאילתות שמורות",
                Style::default().fg(Color::DarkGray),
            );
            return;
        }
        for (i, entry) in self.saved.iter().take(max_rows).enumerate() {
            let y = inner.y + i as u16;
            let marker = if i == self.load_index { "> " } else { "  " };
            let mut style = Style::default();
            if i == self.load_index {
                style = style.fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD);
            }
            buf.set_string(inner.x, y, format!("{marker}{}", entry.name), style);
        }
    }

    /// Render the dialog and return the number of usable content rows.
    pub fn render(&self, area: Rect, buf: &mut Buffer) -> usize {
        Clear.render(area, buf);
        let outer_block = Block::default()
            .title("בניית שאילתה")
            .borders(Borders::ALL)
            .border_type(BorderType::Double);
        let outer_inner_area = outer_block.inner(area);
        outer_block.render(area, buf);

        let instructions = self.instructions();
        let layout = split_dialog_area(
            outer_inner_area,
            self.show_instructions,
            if instructions.is_empty() { None } else { Some(instructions.as_str()) },
        );
        let content_area = layout.content_area;
        let inner = content_area.inner(Margin { vertical: 1, horizontal: 2 });
        let max_rows = std::cmp::max(1, inner.height as usize);
        match self.mode {
            QueryBuilderMode::List => self.render_list(inner, buf, max_rows),
            QueryBuilderMode::EditCondition => self.render_edit(inner, buf),
            QueryBuilderMode::SaveQuery => self.render_save(inner, buf),
            QueryBuilderMode::LoadQuery => self.render_load(inner, buf, max_rows),
        }
        if self.show_instructions
            && let Some(instructions_area) = layout.instructions_area
        {
            use ratatui::widgets::{Paragraph, Wrap};
            let paragraph = Paragraph::new(instructions)
                .block(Block::default().borders(Borders::ALL).title("Instructions"))
                .style(Style::default().fg(Color::Yellow))
                .wrap(Wrap { trim: true });
            paragraph.render(instructions_area, buf);
        }
        max_rows
    }

    /// Handle a key event. Returns Some(action) when the app should react.
    pub fn handle_key(&mut self, key: KeyEvent, max_rows: usize) -> Option<Action> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        if key.code == KeyCode::Char('i') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.show_instructions = !self.show_instructions;
            return None;
        }
        match self.mode {
            QueryBuilderMode::List => self.handle_list_key(key, max_rows),
            QueryBuilderMode::EditCondition => self.handle_edit_key(key),
            QueryBuilderMode::SaveQuery => self.handle_save_key(key),
            QueryBuilderMode::LoadQuery => self.handle_load_key(key),
        }
    }

    fn handle_list_key(&mut self, key: KeyEvent, max_rows: usize) -> Option<Action> {
        if let Some(global_action) = self.config.action_for_key(Mode::Global, key) {
            match global_action {
                Action::Escape => return Some(Action::DialogClose),
                Action::Enter => {
                    self.begin_edit();
                    return None;
                }
                Action::Up => {
                    let len = self.flatten().len();
                    if len > 0 {
                        self.selected =
                            if self.selected == 0 { len - 1 } else { self.selected - 1 };
                        self.clamp_selection(max_rows);
                    }
                    return None;
                }
                Action::Down => {
                    let len = self.flatten().len();
                    if len > 0 {
                        self.selected = (self.selected + 1) % len;
                        self.clamp_selection(max_rows);
                    }
                    return None;
                }
                _ => {}
            }
        }
        if let Some(action) = self.config.action_for_key(Mode::QueryBuilder, key) {
            match action {
                Action::AddCondition => self.add_condition(),
                Action::AddGroup => self.add_group(),
                Action::ToggleGroupOperator => self.toggle_group_operator(),
                Action::ToggleGapOperator => self.toggle_gap_operator(),
                Action::ToggleNegated => self.toggle_negated(),
                Action::DeleteNode => {
                    self.delete_selected();
                    self.clamp_selection(max_rows);
                }
                Action::ResetQuery => self.reset_query(),
                Action::SaveQuery => {
                    self.name_buffer.clear();
                    self.mode = QueryBuilderMode::SaveQuery;
                }
                Action::LoadQuery => {
                    self.load_index = 0;
                    self.mode = QueryBuilderMode::LoadQuery;
                }
                Action::ApplyQuery => {
                    return Some(Action::QueryApplied(self.query.clone()));
                }
                _ => {}
            }
        }
        None
    }

    fn handle_edit_key(&mut self, key: KeyEvent) -> Option<Action> {
        let editable = self.edit.as_ref().is_some_and(|e| {
            let field_type = self.catalog.fields[e.field_index].field_type;
            let operator = operators_for(field_type)
                .get(e.operator_index)
                .copied()
                .unwrap_or_else(|| default_operator(field_type));
            text_editable(field_type, operator)
        });
        match key.code {
            KeyCode::Esc => {
                self.edit = None;
                self.mode = QueryBuilderMode::List;
            }
            KeyCode::Enter => self.commit_edit(),
            KeyCode::Tab => {
                if let Some(edit) = self.edit.as_mut() {
                    edit.focus = edit.focus.next();
                }
            }
            KeyCode::Left | KeyCode::Right => {
                let forward = key.code == KeyCode::Right;
                let focus = self.edit.as_ref().map(|e| e.focus);
                match focus {
                    Some(EditFocus::Field) => self.cycle_field(forward),
                    Some(EditFocus::Operator) => self.cycle_operator(forward),
                    Some(EditFocus::Value) => self.cycle_value(forward),
                    Some(EditFocus::Negated) => {
                        if let Some(edit) = self.edit.as_mut() {
                            edit.negated = !edit.negated;
                        }
                    }
                    None => {}
                }
            }
            KeyCode::Backspace => {
                if let Some(edit) = self.edit.as_mut()
                    && edit.focus == EditFocus::Value
                    && editable
                {
                    edit.value_buffer.pop();
                }
            }
            KeyCode::Char(c) => {
                if let Some(edit) = self.edit.as_mut() {
                    match edit.focus {
                        EditFocus::Negated if c == ' ' => edit.negated = !edit.negated,
                        EditFocus::Value if editable => edit.value_buffer.push(c),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
        None
    }

    fn handle_save_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Esc => {
                self.name_buffer.clear();
                self.mode = QueryBuilderMode::List;
            }
            KeyCode::Enter => self.save_current(),
            KeyCode::Backspace => {
                self.name_buffer.pop();
            }
            KeyCode::Char(c) => self.name_buffer.push(c),
            _ => {}
        }
        None
    }

    fn handle_load_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Esc => self.mode = QueryBuilderMode::List,
            KeyCode::Enter => self.load_selected(),
            KeyCode::Up => {
                if !self.saved.is_empty() {
                    self.load_index = if self.load_index == 0 {
                        self.saved.len() - 1
                    } else {
                        self.load_index - 1
                    };
                }
            }
            KeyCode::Down => {
                if !self.saved.is_empty() {
                    self.load_index = (self.load_index + 1) % self.saved.len();
                }
            }
            _ => {}
        }
        None
    }
}

/// Whether the value buffer takes typed input. Booleans and single-pick
/// selects only cycle; a select under `in` takes a typed comma list.
fn text_editable(field_type: FilterType, operator: FilterOperator) -> bool {
    match field_type {
        FilterType::Boolean => false,
        FilterType::Select => operator == FilterOperator::In,
        _ => true,
    }
}

fn human_connective(op: BoolOperator) -> &'static str {
    match op {
        BoolOperator::And => "וגם",
        BoolOperator::Or => "או",
    }
}

fn find_group<'a>(
    group: &'a crate::query::FilterGroup,
    id: &str,
) -> Option<&'a crate::query::FilterGroup> {
    if group.id == id {
        return Some(group);
    }
    group.groups.iter().find_map(|g| find_group(g, id))
}

fn group_operator(root: &crate::query::FilterGroup, id: &str) -> Option<BoolOperator> {
    find_group(root, id).map(|g| g.operator)
}

fn find_condition<'a>(
    group: &'a crate::query::FilterGroup,
    id: &str,
) -> Option<&'a crate::query::FilterCondition> {
    group
        .conditions
        .iter()
        .find(|c| c.id == id)
        .or_else(|| group.groups.iter().find_map(|g| find_condition(g, id)))
}

/// Editor text for a stored value: arrays join on commas, scalars render as
/// the UI shows them.
fn buffer_from_value(value: &Value) -> String {
    match value {
        Value::Array(items) => {
            items.iter().map(value_display).collect::<Vec<_>>().join(",")
        }
        Value::Bool(b) => b.to_string(),
        other => value_display(other),
    }
}

/// Parse the editor buffer back into a JSON value, shaped for the operator:
/// `between` and `in`/`notIn` split on commas into arrays, numbers parse
/// numerically (falling back to 0), booleans parse from true/false.
fn parse_value(buffer: &str, field_type: FilterType, operator: FilterOperator) -> Value {
    let parse_scalar = |text: &str| -> Value {
        let text = text.trim();
        match field_type {
            FilterType::Number => text
                .parse::<i64>()
                .map(Value::from)
                .or_else(|_| text.parse::<f64>().map(Value::from))
                .unwrap_or(json!(0)),
            FilterType::Boolean => json!(text == "true" || text == "כן"),
            _ => json!(text),
        }
    };
    match operator {
        FilterOperator::Between | FilterOperator::In | FilterOperator::NotIn => {
            Value::Array(buffer.split(',').filter(|s| !s.trim().is_empty()).map(parse_scalar).collect())
        }
        _ => parse_scalar(buffer),
    }
}

impl Component for QueryBuilderDialog {
    fn register_config_handler(&mut self, config: Config) -> Result<()> {
        self.config = config;
        Ok(())
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()> {
        self.render(area, frame.buffer_mut());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::catalog::{FilterOperator, event_field_catalog};

    fn dialog() -> QueryBuilderDialog {
        QueryBuilderDialog::new(event_field_catalog())
    }

    #[test]
    fn test_new_dialog_has_default_condition() {
        let d = dialog();
        assert_eq!(d.query.root_group.conditions.len(), 1);
        let condition = &d.query.root_group.conditions[0];
        assert_eq!(condition.field, "name");
        assert_eq!(condition.operator, FilterOperator::Contains);
        let lines = d.flatten();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].kind, NodeKind::Group);
        assert_eq!(lines[1].kind, NodeKind::Condition);
    }

    #[test]
    fn test_add_condition_targets_parent_of_selected_condition() {
        let mut d = dialog();
        d.selected = 1; // the default condition
        d.add_condition();
        assert_eq!(d.query.root_group.conditions.len(), 2);
    }

    #[test]
    fn test_add_group_and_flatten_order() {
        let mut d = dialog();
        d.selected = 0;
        d.add_group();
        let lines = d.flatten();
        // root, condition, nested group
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2].kind, NodeKind::Group);
        assert_eq!(lines[2].depth, 1);
        assert_eq!(lines[2].index_in_parent, 1);
    }

    #[test]
    fn test_delete_root_is_a_no_op() {
        let mut d = dialog();
        d.selected = 0;
        d.delete_selected();
        assert_eq!(d.flatten().len(), 2);
    }

    #[test]
    fn test_toggle_group_operator_flips_and_or() {
        let mut d = dialog();
        d.selected = 0;
        d.toggle_group_operator();
        assert_eq!(d.query.root_group.operator, BoolOperator::Or);
        d.toggle_group_operator();
        assert_eq!(d.query.root_group.operator, BoolOperator::And);
    }

    #[test]
    fn test_toggle_gap_operator_overrides_single_gap() {
        let mut d = dialog();
        d.selected = 1;
        d.add_condition();
        // Second condition sits at combined index 1; toggling its leading
        // connective flips gap 0 only.
        d.selected = 2;
        d.toggle_gap_operator();
        assert_eq!(d.query.root_group.child_operators, Some(vec![BoolOperator::Or]));
        assert_eq!(d.query.root_group.operator, BoolOperator::And);
    }

    #[test]
    fn test_field_change_resets_operator_and_value_on_type_change() {
        let mut d = dialog();
        d.selected = 1;
        d.begin_edit();
        // name (text) -> description (text): same type, nothing resets
        d.cycle_field(true);
        {
            let edit = d.edit.as_ref().unwrap();
            assert_eq!(d.catalog.fields[edit.field_index].value, "description");
        }
        // description -> duration (number): type change resets defaults
        d.cycle_field(true);
        let edit = d.edit.as_ref().unwrap();
        assert_eq!(d.catalog.fields[edit.field_index].value, "duration");
        assert_eq!(edit.operator_index, 0);
        assert_eq!(edit.value_buffer, "0");
    }

    #[test]
    fn test_commit_edit_updates_condition() {
        let mut d = dialog();
        d.selected = 1;
        d.begin_edit();
        if let Some(edit) = d.edit.as_mut() {
            edit.value_buffer = "Lear".to_string();
            edit.negated = true;
        }
        d.commit_edit();
        let condition = &d.query.root_group.conditions[0];
        assert_eq!(condition.value, json!("Lear"));
        assert!(condition.negated);
        assert_eq!(d.mode, QueryBuilderMode::List);
    }

    #[test]
    fn test_parse_value_shapes() {
        assert_eq!(
            parse_value("10,50", FilterType::Number, FilterOperator::Between),
            json!([10, 50])
        );
        assert_eq!(
            parse_value("א,ב", FilterType::Select, FilterOperator::In),
            json!(["א", "ב"])
        );
        assert_eq!(parse_value("42", FilterType::Number, FilterOperator::Equals), json!(42));
        assert_eq!(parse_value("1.5", FilterType::Number, FilterOperator::Equals), json!(1.5));
        assert_eq!(parse_value("junk", FilterType::Number, FilterOperator::Equals), json!(0));
        assert_eq!(parse_value("true", FilterType::Boolean, FilterOperator::Equals), json!(true));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let mut d = dialog();
        d.selected = 1;
        d.begin_edit();
        if let Some(edit) = d.edit.as_mut() {
            edit.value_buffer = "קונצרט".to_string();
        }
        d.commit_edit();
        d.name_buffer = "שאילתה ראשונה".to_string();
        d.save_current();
        assert_eq!(d.saved_queries().len(), 1);

        d.reset_query();
        assert_eq!(d.query.root_group.conditions[0].value, json!(""));

        d.load_index = 0;
        d.load_selected();
        assert_eq!(d.query.root_group.conditions[0].value, json!("קונצרט"));
    }

    #[test]
    fn test_empty_catalog_yields_unbound_condition_and_no_editor() {
        let mut d = QueryBuilderDialog::new(FieldCatalog::default());
        assert_eq!(d.query.root_group.conditions.len(), 1);
        let condition = &d.query.root_group.conditions[0];
        assert_eq!(condition.field, "");
        assert_eq!(condition.field_type, FilterType::Text);

        // With no fields to cycle the editor refuses to open.
        d.selected = 1;
        d.begin_edit();
        assert_eq!(d.mode, QueryBuilderMode::List);
        assert!(d.edit.is_none());
    }

    #[test]
    fn test_select_in_operator_takes_typed_comma_list() {
        let mut d = dialog();
        d.selected = 1;
        d.begin_edit();
        let hall_index = d.catalog.fields.iter().position(|f| f.value == "hall").unwrap();
        if let Some(edit) = d.edit.as_mut() {
            edit.field_index = hall_index;
            edit.operator_index = 2; // select operators: equals, notEquals, in
            edit.focus = EditFocus::Value;
            edit.value_buffer.clear();
        }
        for c in "אולם ראשי,אולם קטן".chars() {
            d.handle_edit_key(KeyEvent::from(KeyCode::Char(c)));
        }
        d.commit_edit();
        let condition = &d.query.root_group.conditions[0];
        assert_eq!(condition.operator, FilterOperator::In);
        assert_eq!(condition.value, json!(["אולם ראשי", "אולם קטן"]));
    }

    #[test]
    fn test_single_pick_select_ignores_typed_input() {
        let mut d = dialog();
        d.selected = 1;
        d.begin_edit();
        let hall_index = d.catalog.fields.iter().position(|f| f.value == "hall").unwrap();
        if let Some(edit) = d.edit.as_mut() {
            edit.field_index = hall_index;
            edit.operator_index = 0; // equals
            edit.focus = EditFocus::Value;
            edit.value_buffer.clear();
        }
        d.handle_edit_key(KeyEvent::from(KeyCode::Char('x')));
        assert_eq!(d.edit.as_ref().unwrap().value_buffer, "");
        // Cycling still picks options.
        d.cycle_value(true);
        assert_eq!(d.edit.as_ref().unwrap().value_buffer, "אולם קטן");
    }

    #[test]
    fn test_apply_emits_query() {
        let mut d = dialog();
        let key = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::CONTROL);
        // Without config bindings nothing resolves; wire the embedded defaults.
        let cfg: Config = json5::from_str(include_str!("../../.config/config.json5")).unwrap();
        d.register_config_handler(cfg).unwrap();
        let action = d.handle_key(key, 10);
        assert!(matches!(action, Some(Action::QueryApplied(_))));
    }

    #[test]
    fn test_live_compile_footer_reflects_tree() {
        let mut d = dialog();
        d.selected = 1;
        d.begin_edit();
        if let Some(edit) = d.edit.as_mut() {
            edit.value_buffer = "Lear".to_string();
        }
        d.commit_edit();
        let compiled = d.compiled();
        assert_eq!(compiled.query_string, "name LIKE :p1");
        assert_eq!(compiled.human_readable, "שם אירוע מכיל Lear");
    }
}
