// ⚖️ Parity Resolution - what to do with an odd-sized roster
//
// Called only when the roster has an odd number of distinct names. The decision
// (who sits out, or who sits in) belongs to the caller: a config entry,
// a CLI prompt, a test closure.

use crate::error::{Error, Result};
use std::collections::BTreeSet;
use tracing::info;

pub trait ParityResolver {
    /// Turn an odd roster into the roster to match
    fn resolve(&mut self, roster: Vec<String>) -> Result<Vec<String>>;
}

impl<F> ParityResolver for F
where
    F: FnMut(Vec<String>) -> Result<Vec<String>>,
{
    fn resolve(&mut self, roster: Vec<String>) -> Result<Vec<String>> {
        self(roster)
    }
}

/// Drop the first listed volunteer who is on the roster
#[derive(Debug, Clone)]
pub struct DropParticipant {
    pub candidates: Vec<String>,
}

impl DropParticipant {
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DropParticipant {
            candidates: candidates.into_iter().map(Into::into).collect(),
        }
    }
}

impl ParityResolver for DropParticipant {
    fn resolve(&mut self, mut roster: Vec<String>) -> Result<Vec<String>> {
        let position = self
            .candidates
            .iter()
            .find_map(|candidate| roster.iter().position(|name| name == candidate));

        match position {
            Some(index) => {
                let dropped = roster.remove(index);
                info!("Odd number of participants, {} sits out this round", dropped);
                Ok(roster)
            }
            None => Err(Error::Aborted(format!(
                "odd number of participants and none of {:?} can sit out",
                self.candidates
            ))),
        }
    }
}

/// Bring in a designated stand-in so everyone has a partner.
///
/// If the stand-in is already on the roster they sit out instead.
#[derive(Debug, Clone)]
pub struct SitIn {
    pub stand_in: String,
}

impl SitIn {
    pub fn new(stand_in: impl Into<String>) -> Self {
        SitIn {
            stand_in: stand_in.into(),
        }
    }
}

impl ParityResolver for SitIn {
    fn resolve(&mut self, mut roster: Vec<String>) -> Result<Vec<String>> {
        if let Some(index) = roster.iter().position(|name| *name == self.stand_in) {
            roster.remove(index);
            info!("Stand-in {} is already participating, sitting out instead", self.stand_in);
        } else {
            info!("Odd number of participants, {} sits in", self.stand_in);
            roster.push(self.stand_in.clone());
        }
        Ok(roster)
    }
}

/// Apply `resolver` if and only if the roster has an odd number of distinct
/// names. Repeated names are collapsed to their first occurrence.
pub fn resolve_parity<R>(roster: Vec<String>, resolver: &mut R) -> Result<Vec<String>>
where
    R: ParityResolver + ?Sized,
{
    let mut seen = BTreeSet::new();
    let roster: Vec<String> = roster
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect();

    if roster.len() % 2 == 0 {
        return Ok(roster);
    }
    resolver.resolve(roster)
}
