// Editable text forms.
//
// Every data-entry surface in the TUI is a `Form`: an ordered list of text
// fields with one focused field. Some forms fill a whole screen (wizard
// steps, the plan, the final report, the ask prompt); the rest open as a
// modal over the current screen and close on submit or Esc.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use farmai_app::protocol::UserCommand;
use farmai_core::diagnosis::GENERAL_INFO_FIELDS;
use farmai_core::farm::{Farm, FarmUpdate, NewFarm};
use farmai_core::fields::{parse_number, FieldKind, FieldSpec, FieldValues};
use farmai_core::plan::{ConsultingPlan, DocField, FinalReport};
use farmai_core::wizard::DataStep;

#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub key: String,
    pub label: String,
    pub value: String,
    pub multiline: bool,
}

impl FormField {
    fn new(key: &str, label: impl Into<String>, value: impl Into<String>, multiline: bool) -> Self {
        FormField {
            key: key.to_string(),
            label: label.into(),
            value: value.into(),
            multiline,
        }
    }

    fn from_spec(spec: &FieldSpec, values: &FieldValues) -> Self {
        FormField::new(
            spec.key,
            spec.display_label(),
            values.get(spec.key).unwrap_or_default(),
            spec.kind == FieldKind::LongText,
        )
    }

    fn from_doc(doc: &DocField, value: Option<String>) -> Self {
        FormField::new(doc.key, doc.label, value.unwrap_or_default(), doc.multiline)
    }
}

/// What a form edits, and therefore what submitting it produces.
#[derive(Debug, Clone, PartialEq)]
pub enum FormKind {
    NewFarm,
    EditFarm { farm: Farm },
    StepData { farm_id: String, step: DataStep },
    /// General information of the diagnosis sheet. Applied to the sheet on
    /// screen; saved together with the levels.
    GeneralInfo,
    InterviewEntry { farm_id: String },
    AudioPath { farm_id: String },
    Plan { farm_id: String, base: ConsultingPlan },
    FinalReport { farm_id: String },
    Ask { farm_id: String },
}

/// Result of submitting a form.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Command(UserCommand),
    GeneralInfo(Vec<(String, String)>),
}

/// Result of a key press inside a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormAction {
    Edited,
    Submit,
    Cancel,
    /// Not a form key; the screen may handle it.
    Ignored,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Form {
    pub kind: FormKind,
    pub title: String,
    pub fields: Vec<FormField>,
    pub focus: usize,
}

impl Form {
    fn new(kind: FormKind, title: impl Into<String>, fields: Vec<FormField>) -> Self {
        Form {
            kind,
            title: title.into(),
            fields,
            focus: 0,
        }
    }

    pub fn new_farm() -> Self {
        Form::new(FormKind::NewFarm, "New farm", farm_fields(None))
    }

    pub fn edit_farm(farm: &Farm) -> Self {
        Form::new(
            FormKind::EditFarm { farm: farm.clone() },
            format!("Edit {}", farm.name),
            farm_fields(Some(farm)),
        )
    }

    pub fn step_data(farm_id: &str, step: DataStep, values: &FieldValues) -> Self {
        Form::new(
            FormKind::StepData {
                farm_id: farm_id.to_string(),
                step,
            },
            format!("Step {}/{}: {}", step.number(), DataStep::ALL.len(), step.title()),
            step.fields()
                .iter()
                .map(|spec| FormField::from_spec(spec, values))
                .collect(),
        )
    }

    pub fn general_info(values: &FieldValues) -> Self {
        Form::new(
            FormKind::GeneralInfo,
            "General information",
            GENERAL_INFO_FIELDS
                .iter()
                .map(|spec| FormField::from_spec(spec, values))
                .collect(),
        )
    }

    pub fn interview_entry(farm_id: &str, question: &str, answer: &str) -> Self {
        Form::new(
            FormKind::InterviewEntry {
                farm_id: farm_id.to_string(),
            },
            "Interview entry",
            vec![
                FormField::new("question", "Question", question, false),
                FormField::new("answer", "Answer", answer, true),
            ],
        )
    }

    pub fn audio_path(farm_id: &str) -> Self {
        Form::new(
            FormKind::AudioPath {
                farm_id: farm_id.to_string(),
            },
            "Transcribe recording",
            vec![FormField::new("path", "Audio file", "", false)],
        )
    }

    pub fn plan(farm_id: &str, plan: &ConsultingPlan) -> Self {
        Form::new(
            FormKind::Plan {
                farm_id: farm_id.to_string(),
                base: plan.clone(),
            },
            "Consulting plan",
            ConsultingPlan::FIELDS
                .iter()
                .map(|doc| FormField::from_doc(doc, plan.field(doc.key)))
                .collect(),
        )
    }

    pub fn final_report(farm_id: &str, report: &FinalReport) -> Self {
        Form::new(
            FormKind::FinalReport {
                farm_id: farm_id.to_string(),
            },
            "Final report",
            FinalReport::FIELDS
                .iter()
                .map(|doc| FormField::from_doc(doc, report.field(doc.key)))
                .collect(),
        )
    }

    pub fn ask(farm_id: &str) -> Self {
        Form::new(
            FormKind::Ask {
                farm_id: farm_id.to_string(),
            },
            "Ask",
            vec![FormField::new("question", "Question", "", false)],
        )
    }

    /// Modal forms overlay a screen; the others are the screen.
    pub fn is_modal(&self) -> bool {
        matches!(
            self.kind,
            FormKind::NewFarm
                | FormKind::EditFarm { .. }
                | FormKind::GeneralInfo
                | FormKind::InterviewEntry { .. }
                | FormKind::AudioPath { .. }
        )
    }

    pub fn value(&self, key: &str) -> &str {
        self.fields
            .iter()
            .find(|f| f.key == key)
            .map_or("", |f| f.value.as_str())
    }

    pub fn set_value(&mut self, key: &str, value: &str) {
        if let Some(field) = self.fields.iter_mut().find(|f| f.key == key) {
            field.value = value.to_string();
        }
    }

    pub fn clear(&mut self) {
        for field in &mut self.fields {
            field.value.clear();
        }
        self.focus = 0;
    }

    fn focused_mut(&mut self) -> Option<&mut FormField> {
        self.fields.get_mut(self.focus)
    }

    fn next_field(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + 1) % self.fields.len();
        }
    }

    fn previous_field(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + self.fields.len() - 1) % self.fields.len();
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> FormAction {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('s') if ctrl => FormAction::Submit,
            KeyCode::Char(_) if ctrl => FormAction::Ignored,
            KeyCode::Esc => FormAction::Cancel,
            KeyCode::Tab | KeyCode::Down => {
                self.next_field();
                FormAction::Edited
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.previous_field();
                FormAction::Edited
            }
            KeyCode::Enter => {
                let last = self.focus + 1 >= self.fields.len();
                match self.focused_mut() {
                    Some(field) if field.multiline => {
                        field.value.push('\n');
                        FormAction::Edited
                    }
                    _ if last => FormAction::Submit,
                    _ => {
                        self.next_field();
                        FormAction::Edited
                    }
                }
            }
            KeyCode::Backspace => {
                if let Some(field) = self.focused_mut() {
                    field.value.pop();
                }
                FormAction::Edited
            }
            KeyCode::Char(c) => {
                if let Some(field) = self.focused_mut() {
                    field.value.push(c);
                }
                FormAction::Edited
            }
            _ => FormAction::Ignored,
        }
    }

    fn inputs(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|f| (f.key.clone(), f.value.clone()))
            .collect()
    }

    /// Turn the entered text into a command. Errors are messages for the
    /// user; the form stays open.
    pub fn submit(&self) -> Result<Submission, String> {
        let command = match &self.kind {
            FormKind::NewFarm => UserCommand::CreateFarm(self.farm_input()?),
            FormKind::EditFarm { farm } => {
                let update = FarmUpdate::diff(farm, &self.farm_input()?);
                if update.is_empty() {
                    return Err("Nothing changed".to_string());
                }
                UserCommand::UpdateFarm(update)
            }
            FormKind::StepData { farm_id, step } => UserCommand::SaveStepData {
                farm_id: farm_id.clone(),
                step: *step,
                inputs: self.inputs(),
            },
            FormKind::GeneralInfo => return Ok(Submission::GeneralInfo(self.inputs())),
            FormKind::InterviewEntry { farm_id } => UserCommand::AddInterviewEntry {
                farm_id: farm_id.clone(),
                question: self.value("question").to_string(),
                answer: self.value("answer").to_string(),
            },
            FormKind::AudioPath { farm_id } => {
                let path = self.value("path").trim();
                if path.is_empty() {
                    return Err("Audio file is required".to_string());
                }
                UserCommand::TranscribeAudio {
                    farm_id: farm_id.clone(),
                    path: path.into(),
                }
            }
            FormKind::Plan { farm_id, base } => {
                let mut plan = base.clone();
                for field in &self.fields {
                    plan.set_field(&field.key, &field.value)
                        .map_err(|e| e.to_string())?;
                }
                plan.validate().map_err(|e| e.to_string())?;
                UserCommand::SavePlan {
                    farm_id: farm_id.clone(),
                    plan,
                }
            }
            FormKind::FinalReport { farm_id } => {
                let mut report = FinalReport::default();
                for field in &self.fields {
                    report
                        .set_field(&field.key, &field.value)
                        .map_err(|e| e.to_string())?;
                }
                UserCommand::SaveFinalReport {
                    farm_id: farm_id.clone(),
                    report,
                }
            }
            FormKind::Ask { farm_id } => UserCommand::Ask {
                farm_id: farm_id.clone(),
                question: self.value("question").to_string(),
            },
        };
        Ok(Submission::Command(command))
    }

    fn farm_input(&self) -> Result<NewFarm, String> {
        let size = match self.value("size").trim() {
            "" => None,
            text => Some(
                parse_number(text).ok_or_else(|| format!("invalid `size`: `{text}` is not a number"))?,
            ),
        };
        let crop = Some(self.value("crop").trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        let input = NewFarm {
            name: self.value("name").trim().to_string(),
            location: self.value("location").trim().to_string(),
            owner_name: self.value("owner_name").trim().to_string(),
            size,
            crop,
        };
        input.validate().map_err(|e| e.to_string())?;
        Ok(input)
    }
}

fn farm_fields(farm: Option<&Farm>) -> Vec<FormField> {
    let text = |f: fn(&Farm) -> String| farm.map(f).unwrap_or_default();
    vec![
        FormField::new("name", "Farm name", text(|f| f.name.clone()), false),
        FormField::new("location", "Location", text(|f| f.location.clone()), false),
        FormField::new("owner_name", "Owner", text(|f| f.owner_name.clone()), false),
        FormField::new(
            "size",
            "Area (m²)",
            text(|f| f.size.map(|s| s.to_string()).unwrap_or_default()),
            false,
        ),
        FormField::new(
            "crop",
            "Crop",
            text(|f| f.crop.clone().unwrap_or_default()),
            false,
        ),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
