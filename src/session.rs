//! A recipient's walk through the signing flow. Every legal step change
//! is listed in one transition table; anything not in the table leaves
//! the step where it is. `Signature -> Confirmation` has no table entry
//! on purpose, it is reachable only through `submit`.

use std::collections::HashMap;

use crate::assembly::AssemblyEngine;
use crate::error::Error;
use crate::models::{FieldId, FieldType, Recipient, SignedDocument, SigningRequest, TemplateField};
use crate::signature::SignaturePad;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SigningStep {
    Welcome,
    Review,
    Form,
    Signature,
    Confirmation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Event {
    Next,
    Back,
}

#[derive(Clone, Copy, Debug)]
enum Guard {
    Always,
    RequiredInputsFilled,
}

struct Transition {
    from: SigningStep,
    event: Event,
    guard: Guard,
    to: SigningStep,
}

const TRANSITIONS: &[Transition] = &[
    Transition {
        from: SigningStep::Welcome,
        event: Event::Next,
        guard: Guard::Always,
        to: SigningStep::Review,
    },
    Transition {
        from: SigningStep::Review,
        event: Event::Next,
        guard: Guard::Always,
        to: SigningStep::Form,
    },
    Transition {
        from: SigningStep::Form,
        event: Event::Next,
        guard: Guard::RequiredInputsFilled,
        to: SigningStep::Signature,
    },
    Transition {
        from: SigningStep::Review,
        event: Event::Back,
        guard: Guard::Always,
        to: SigningStep::Welcome,
    },
    Transition {
        from: SigningStep::Form,
        event: Event::Back,
        guard: Guard::Always,
        to: SigningStep::Review,
    },
    Transition {
        from: SigningStep::Signature,
        event: Event::Back,
        guard: Guard::Always,
        to: SigningStep::Form,
    },
];

#[derive(Debug)]
pub struct SigningSession {
    request: SigningRequest,
    recipient: Recipient,
    fields: Vec<TemplateField>,
    values: HashMap<FieldId, String>,
    step: SigningStep,
    submitting: bool,
    completed: bool,
}

impl SigningSession {
    pub fn new(request: SigningRequest, recipient: Recipient, fields: Vec<TemplateField>) -> Self {
        Self {
            request,
            recipient,
            fields,
            values: HashMap::new(),
            step: SigningStep::Welcome,
            submitting: false,
            completed: false,
        }
    }

    pub fn step(&self) -> SigningStep {
        self.step
    }

    pub fn request(&self) -> &SigningRequest {
        &self.request
    }

    pub fn recipient(&self) -> &Recipient {
        &self.recipient
    }

    pub fn fields(&self) -> &[TemplateField] {
        &self.fields
    }

    pub fn value(&self, id: FieldId) -> Option<&str> {
        self.values.get(&id).map(String::as_str)
    }

    /// Moves forward one step. A guarded transition that fails returns
    /// `Validation` with the offending field names and leaves the step
    /// unchanged; a step with no forward transition is also unchanged.
    pub fn advance(&mut self) -> Result<SigningStep, Error> {
        self.fire(Event::Next)
    }

    /// Moves back one step, keeping every collected value. `Welcome` and
    /// the terminal `Confirmation` stay put.
    pub fn back(&mut self) -> SigningStep {
        self.fire(Event::Back).unwrap_or(self.step)
    }

    fn fire(&mut self, event: Event) -> Result<SigningStep, Error> {
        let transition = TRANSITIONS
            .iter()
            .find(|t| t.from == self.step && t.event == event);
        if let Some(t) = transition {
            match t.guard {
                Guard::Always => {}
                Guard::RequiredInputsFilled => {
                    let missing = self.missing_required_inputs();
                    if !missing.is_empty() {
                        return Err(Error::Validation(missing));
                    }
                }
            }
            self.step = t.to;
        }
        Ok(self.step)
    }

    pub fn set_value(&mut self, id: FieldId, value: String) -> Result<(), Error> {
        if self.completed {
            return Err(Error::AlreadyCompleted);
        }
        self.values.insert(id, value);
        Ok(())
    }

    /// Takes the pad's current drawing. An empty pad exports nothing and
    /// leaves any previously captured image in place.
    pub fn capture_signature(&mut self, id: FieldId, pad: &SignaturePad) -> Result<(), Error> {
        if self.completed {
            return Err(Error::AlreadyCompleted);
        }
        if let Some(url) = pad.export_data_url() {
            self.values.insert(id, url);
        }
        Ok(())
    }

    /// Required non-signature fields with no value yet.
    pub fn missing_required_inputs(&self) -> Vec<String> {
        self.missing_required(|t| t != FieldType::Signature)
    }

    /// Required signature fields with no captured image yet.
    pub fn missing_required_signatures(&self) -> Vec<String> {
        self.missing_required(|t| t == FieldType::Signature)
    }

    fn missing_required(&self, type_filter: impl Fn(FieldType) -> bool) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.required && type_filter(f.field_type))
            .filter(|f| self.values.get(&f.id).map_or(true, |v| v.is_empty()))
            .map(|f| f.name.clone())
            .collect()
    }

    /// Runs assembly and, on success, enters the terminal `Confirmation`
    /// step. Only callable from the signature step, so the earlier
    /// guards cannot be skipped; every required field is re-checked here
    /// before any write happens. Holds a one-shot latch so a double
    /// invocation while assembly is in flight fails fast; a failed run
    /// releases the latch and leaves the step unchanged.
    pub async fn submit(&mut self, engine: &AssemblyEngine) -> Result<SignedDocument, Error> {
        if self.completed {
            return Err(Error::AlreadyCompleted);
        }
        if self.submitting {
            return Err(Error::SubmitInFlight);
        }
        if self.step != SigningStep::Signature {
            return Err(Error::SubmitOutOfOrder);
        }
        let mut missing = self.missing_required_inputs();
        missing.extend(self.missing_required_signatures());
        if !missing.is_empty() {
            return Err(Error::Validation(missing));
        }

        self.submitting = true;
        let result = engine
            .complete(&self.request, &self.recipient, &self.fields, &self.values)
            .await;
        self.submitting = false;

        match result {
            Ok(doc) => {
                self.step = SigningStep::Confirmation;
                self.completed = true;
                Ok(doc)
            }
            Err(err) => Err(err),
        }
    }
}
