// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::collections::BTreeSet;

use midly::{MidiMessage, Smf, TrackEventKind};

use crate::actuator::ActuatorSink;
use crate::smf::{ParsedFile, RawEventKind, TrackEnd};
use crate::timeline::{EventKind, Timeline};

/// Severity level for a verification issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A single verification issue found during checking.
#[derive(Debug, Clone)]
pub struct Issue {
    pub severity: Severity,
    pub category: &'static str,
    pub track: Option<usize>,
    pub message: String,
}

/// Result of verifying a file against a player configuration.
#[derive(Debug, Clone, Default)]
pub struct VerificationReport {
    pub issues: Vec<Issue>,
}

impl VerificationReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    fn categories(&self) -> Vec<&'static str> {
        self.issues.iter().map(|i| i.category).collect()
    }
}

/// Reports tracks that stopped early and notes the pitch mapper dropped.
pub fn check_tracks(parsed: &ParsedFile) -> Vec<Issue> {
    let mut issues = Vec::new();
    for track in &parsed.tracks {
        if let TrackEnd::Failed(e) = &track.end {
            issues.push(Issue {
                severity: Severity::Error,
                category: "track-parse",
                track: Some(track.index),
                message: format!(
                    "track stopped after {} event(s): {}",
                    track.events.len(),
                    e
                ),
            });
        }
        if track.dropped_notes > 0 {
            issues.push(Issue {
                severity: Severity::Warning,
                category: "pitch-range",
                track: Some(track.index),
                message: format!(
                    "{} note event(s) outside the pitch range will be silent",
                    track.dropped_notes
                ),
            });
        }
    }
    if let Some(e) = &parsed.stopped {
        issues.push(Issue {
            severity: Severity::Error,
            category: "track-chunk",
            track: None,
            message: format!(
                "only {} of {} track(s) could be read: {}",
                parsed.tracks.len(),
                parsed.header.track_count,
                e
            ),
        });
    }
    issues
}

/// SMPTE timing plays at a fixed tick rate and cannot follow tempo changes.
pub fn check_division(parsed: &ParsedFile) -> Option<Issue> {
    parsed.header.reduced_accuracy().then(|| Issue {
        severity: Severity::Warning,
        category: "division",
        track: None,
        message: format!(
            "{}: timing ignores tempo events and is less accurate",
            parsed.header.division
        ),
    })
}

/// Reports channel ids used by the timeline that the sink cannot resolve.
pub fn check_channels(
    timeline: &Timeline,
    sink: &dyn ActuatorSink,
    channel_index_base: u32,
) -> Option<Issue> {
    let channels: BTreeSet<u32> = timeline
        .events()
        .iter()
        .filter_map(|event| match event.kind {
            EventKind::NoteOn(note) | EventKind::NoteOff(note) => {
                Some(channel_index_base.saturating_add(note.mapping.channel_index))
            }
            EventKind::Tempo { .. } => None,
        })
        .collect();
    let missing: Vec<String> = channels
        .into_iter()
        .filter(|channel| sink.resolve(*channel).is_none())
        .map(|channel| channel.to_string())
        .collect();

    (!missing.is_empty()).then(|| Issue {
        severity: Severity::Warning,
        category: "actuators",
        track: None,
        message: format!(
            "{} has no actuator for channel(s) {}",
            sink,
            missing.join(", ")
        ),
    })
}

/// Compares per-track note counts against the midly decoder.
pub fn check_reference(bytes: &[u8], parsed: &ParsedFile) -> Vec<Issue> {
    let smf = match Smf::parse(bytes) {
        Ok(smf) => smf,
        Err(e) => {
            return vec![Issue {
                severity: Severity::Warning,
                category: "reference",
                track: None,
                message: format!("reference decoder rejected the file: {}", e),
            }]
        }
    };

    parsed
        .tracks
        .iter()
        .zip(smf.tracks.iter())
        .filter_map(|(track, reference)| {
            let expected = reference
                .iter()
                .filter(|event| {
                    matches!(
                        event.kind,
                        TrackEventKind::Midi {
                            message: MidiMessage::NoteOn { .. } | MidiMessage::NoteOff { .. },
                            ..
                        }
                    )
                })
                .count();
            let found = track
                .events
                .iter()
                .filter(|event| !matches!(event.kind, RawEventKind::Tempo { .. }))
                .count()
                + track.dropped_notes;

            (expected != found).then(|| Issue {
                severity: Severity::Warning,
                category: "reference",
                track: Some(track.index),
                message: format!(
                    "reference decoder found {} note event(s), parsed {}",
                    expected, found
                ),
            })
        })
        .collect()
}

/// Runs every check.
pub fn verify(
    bytes: &[u8],
    parsed: &ParsedFile,
    timeline: &Timeline,
    sink: &dyn ActuatorSink,
    channel_index_base: u32,
) -> VerificationReport {
    let mut report = VerificationReport::default();
    report.issues.extend(check_tracks(parsed));
    report.issues.extend(check_division(parsed));
    report
        .issues
        .extend(check_channels(timeline, sink, channel_index_base));
    report.issues.extend(check_reference(bytes, parsed));
    report
}

/// Prints a verification report.
pub fn print_report(report: &VerificationReport, file_name: &str) {
    if report.is_clean() {
        println!("\u{2705} {} passed verification.", file_name);
        return;
    }

    println!("{}:", file_name);
    for issue in &report.issues {
        let icon = match issue.severity {
            Severity::Error => "\u{274c}",
            Severity::Warning => "\u{26a0}\u{fe0f}",
        };
        match issue.track {
            Some(track) => println!(
                "  {} [{}] track {}: {}",
                icon, issue.category, track, issue.message
            ),
            None => println!("  {} [{}] {}", icon, issue.category, issue.message),
        }
    }
    println!("\nCategories: {}", report.categories().join(", "));
}
