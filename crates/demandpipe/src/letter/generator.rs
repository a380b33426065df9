//! Lays out the demand letter as document blocks.

use std::path::{Path, PathBuf};

use tracing::{info, info_span, warn};

use crate::sanitize::redact_path;

use super::docx::{Alignment, Block, DocxWriter, Paragraph, Run};
use super::error::LetterError;
use super::metadata::{load_metadata, LetterMetadata};

const SETTLEMENT_NOTICE: &str = "THIS LETTER IS FOR THE PURPOSE OF SETTLEMENT ONLY;\n\
IT IS NOT TO BE USED AS EVIDENCE OF ANY KIND.\n\
(CALIFORNIA EVIDENCE CODE SECTIONS 1152-54, ET SEQ.)\n\
THE CONTENTS OF THIS DEMAND SHALL NOT BE REPRODUCED\n\
OR REDISTRIBUTED FOR ANY PURPOSE.";

const CIVIL_CODE_3333: &str = "Breach of obligation other than contract. For the breach of an \
obligation not arising from contract, the measure of damages, except where otherwise expressly \
provided by this code, is the amount which will compensate for all the detriment proximately \
caused thereby, whether it could have been anticipated or not.";

const CAPELOUTO: &str = "Pain and suffering is a unitary concept, encompassing all of the \
physical and emotional trauma occasioned by an injury. Plaintiff is entitled to compensatory \
damages for all physical pain suffered . . . and also for resulting fright, nervousness, \
anxiety, worry, mortification, shock, humiliation, indignity, embarrassment, apprehension, \
terror, or ordeal. Capelouto v. Kaiser Foundation Hospitals (1972) 7 Cal.App.3d 889, 893-894.";

/// Renders letter metadata into document blocks.
pub struct DemandLetter<'a> {
    meta: &'a LetterMetadata,
    blocks: Vec<Block>,
}

impl<'a> DemandLetter<'a> {
    pub fn render(meta: &'a LetterMetadata) -> Vec<Block> {
        let mut letter = Self {
            meta,
            blocks: Vec::new(),
        };

        letter.logo_and_date();
        letter.insurance_block();
        letter.title();
        letter.client_info();
        letter.settlement_notice();
        letter.salutation_and_intro();
        letter.incident_and_medical();
        letter.compensation();

        letter.blocks
    }

    fn push(&mut self, paragraph: Paragraph) {
        self.blocks.push(Block::Paragraph(paragraph));
    }

    fn heading(&mut self, text: &str, before: u32, after: u32) {
        self.push(
            Paragraph::with_run(Run::new(text).size(16).bold().underline())
                .align(Alignment::Center)
                .spacing(before, after),
        );
    }

    fn body(&mut self, text: impl Into<String>, alignment: Alignment) {
        self.push(
            Paragraph::with_run(Run::new(text))
                .align(alignment)
                .spacing(0, 80),
        );
    }

    fn logo_and_date(&mut self) {
        if let Some(logo) = &self.meta.logo_path {
            warn!(file = %redact_path(logo), "Images are not embedded, skipping logo");
        }

        let date = self.meta.demand_creation_date.format("%B %d, %Y").to_string();
        self.push(
            Paragraph::with_run(Run::new(date).size(14).bold().underline())
                .align(Alignment::Center)
                .spacing(0, 80),
        );
    }

    fn insurance_block(&mut self) {
        let insurance = &self.meta.insurance;
        let lines: Vec<String> = [
            insurance.name.clone(),
            self.meta.claim_number.as_ref().map(|c| format!("Attn: {}", c)),
            insurance.address.clone(),
            insurance.telephone.as_ref().map(|t| format!("Tel: {}", t)),
            insurance.fax.as_ref().map(|f| format!("Fax: {}", f)),
        ]
        .into_iter()
        .flatten()
        .collect();

        let left = Paragraph::with_run(Run::new(lines.join("\n")));
        let right = Paragraph::with_run(Run::new("Sent Via Certified U.S. Mail\nFacsimile"))
            .align(Alignment::Right);

        self.blocks.push(Block::Row(vec![left, right]));
    }

    fn title(&mut self) {
        let title = format!(
            "*** {} POLICY LIMIT DEMAND ***",
            self.meta.accident_type.to_uppercase()
        );
        self.push(
            Paragraph::with_run(Run::new(title).size(18).bold().underline())
                .align(Alignment::Center)
                .spacing(80, 80),
        );
    }

    fn client_info(&mut self) {
        let meta = self.meta;
        let date_of_loss = meta.date_of_loss.format("%m/%d/%Y").to_string();
        let lines: Vec<String> = [
            ("Client", Some(meta.client_display_name.as_str())),
            ("Date of Loss", Some(date_of_loss.as_str())),
            ("Your Insured", meta.defendant_name.as_deref()),
            ("Claim #", meta.claim_number.as_deref()),
            ("Adjuster", meta.defendant_adjuster.as_deref()),
        ]
        .into_iter()
        .filter_map(|(label, value)| {
            value
                .filter(|v| !v.is_empty())
                .map(|v| format!("{}: {}", label, v))
        })
        .collect();

        self.push(
            Paragraph::with_run(Run::new(lines.join("\n")))
                .align(Alignment::Center)
                .spacing(0, 80),
        );
    }

    fn settlement_notice(&mut self) {
        self.push(
            Paragraph::with_run(Run::new(SETTLEMENT_NOTICE).bold().underline())
                .align(Alignment::Center)
                .spacing(80, 80),
        );
    }

    fn salutation_and_intro(&mut self) {
        let meta = self.meta;
        self.push(Paragraph::with_run(Run::new("To Whom It May Concern:")).spacing(0, 20));

        let full_name = if meta.title.is_empty() {
            meta.client_display_name.clone()
        } else {
            format!("{}. {}", meta.title, meta.client_display_name)
        };

        self.push(
            Paragraph::new()
                .run(Run::new("This office represents "))
                .run(Run::new(format!("{} (\u{201c}{}\u{201d})", full_name, meta.formal_name())).bold())
                .run(Run::new(
                    " in the above-referenced incident involving your insured. \
                     We hereby extend this formal offer of settlement as set forth herein.",
                ))
                .align(Alignment::Justify)
                .spacing(0, 80),
        );
    }

    fn incident_and_medical(&mut self) {
        let meta = self.meta;
        self.heading("THE INCIDENT", 80, 40);
        self.push(
            Paragraph::with_run(Run::new(meta.incident_summary.clone().unwrap_or_default()))
                .align(Alignment::Justify)
                .spacing(0, 60),
        );

        if meta.medical_records.is_empty() {
            return;
        }

        self.heading("SUMMARY OF MEDICAL CARE & INJURIES", 0, 60);
        for record in &meta.medical_records {
            if let Some(summary) = record.summary.as_deref().filter(|s| !s.trim().is_empty()) {
                self.push(
                    Paragraph::with_run(Run::new(summary))
                        .align(Alignment::Justify)
                        .spacing(0, 60),
                );
            }
            if let Some(image) = &record.image_path {
                warn!(file = %redact_path(image), "Images are not embedded, skipping medical image");
            }
        }
    }

    fn compensation(&mut self) {
        let name = self.meta.formal_name();
        self.blocks.push(Block::PageBreak);

        self.heading("CLAIM FOR COMPENSATION", 0, 80);
        self.body(
            format!(
                "{} is entitled to full and fair compensation for losses incurred in this \
                 accident. Relevant California law provides as follows:",
                name
            ),
            Alignment::Left,
        );
        self.push(
            Paragraph::with_run(Run::new("Civil Code \u{a7} 3333.  Torts in General").underline())
                .align(Alignment::Center)
                .spacing(0, 80),
        );
        self.body(CIVIL_CODE_3333, Alignment::Center);
        self.body(
            format!(
                "{} is also entitled to recover for all the pain and suffering experienced as \
                 a result of this accident:",
                name
            ),
            Alignment::Left,
        );
        self.body(CAPELOUTO, Alignment::Center);
        self.body(
            "The applicable jury instruction provides, in pertinent part, as follows:",
            Alignment::Left,
        );
        self.push(
            Paragraph::with_run(Run::new("CACI 3905A").size(16).bold())
                .align(Alignment::Center)
                .spacing(0, 80),
        );
        self.body(
            format!(
                "{} is also entitled to recover for all past and future noneconomic damages \
                 caused by your insured\u{2019}s negligence, including physical pain, mental \
                 suffering, loss of enjoyment of life, disfigurement, physical impairment, \
                 inconvenience, grief, anxiety, humiliation, and emotional distress. \
                 (CACI 3905A, Physical Pain, Mental Suffering, and Emotional Distress)",
                name
            ),
            Alignment::Center,
        );
    }
}

/// Loads metadata from `metadata_path` and writes the letter to `output_path`.
pub fn generate_letter(metadata_path: &Path, output_path: &Path) -> Result<PathBuf, LetterError> {
    let _span = info_span!("generate_letter", metadata = %redact_path(metadata_path)).entered();

    let meta = load_metadata(metadata_path)?;
    let blocks = DemandLetter::render(&meta);

    DocxWriter::default().write_to_path(&blocks, output_path)?;
    info!(output = %redact_path(output_path), blocks = blocks.len(), "Demand letter created");

    Ok(output_path.to_path_buf())
}
