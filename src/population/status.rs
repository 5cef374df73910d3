use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};
use std::{
    fmt::{self, Display},
    ops::{Index, IndexMut},
};

/// The five SEIRD compartments an agent can occupy.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfectionStatus {
    Susceptible,
    Exposed,
    Infected,
    Recovered,
    Dead,
}

impl InfectionStatus {
    pub const ALL: [InfectionStatus; 5] = [
        InfectionStatus::Susceptible,
        InfectionStatus::Exposed,
        InfectionStatus::Infected,
        InfectionStatus::Recovered,
        InfectionStatus::Dead,
    ];

    #[must_use]
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            InfectionStatus::Susceptible => "susceptible",
            InfectionStatus::Exposed => "exposed",
            InfectionStatus::Infected => "infected",
            InfectionStatus::Recovered => "recovered",
            InfectionStatus::Dead => "dead",
        }
    }

    /// The S -> E -> I -> {R, D} ordering. Susceptible agents may also become infected
    /// directly when the exposed pool cannot supply enough new infections.
    #[must_use]
    pub fn can_transition_to(self, next: InfectionStatus) -> bool {
        use InfectionStatus::*;
        matches!(
            (self, next),
            (Susceptible, Exposed)
                | (Susceptible, Infected)
                | (Exposed, Infected)
                | (Infected, Recovered)
                | (Infected, Dead)
        )
    }
}

impl Display for InfectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// One value per compartment, indexed by `InfectionStatus`.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PerState<T>([T; 5]);

impl<T> PerState<T> {
    #[must_use]
    pub fn new(susceptible: T, exposed: T, infected: T, recovered: T, dead: T) -> Self {
        PerState([susceptible, exposed, infected, recovered, dead])
    }

    pub fn from_fn(mut f: impl FnMut(InfectionStatus) -> T) -> Self {
        PerState(InfectionStatus::ALL.map(&mut f))
    }

    pub fn iter(&self) -> impl Iterator<Item = (InfectionStatus, &T)> {
        InfectionStatus::ALL.into_iter().zip(self.0.iter())
    }

    pub fn values(&self) -> &[T; 5] {
        &self.0
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> PerState<U> {
        PerState::from_fn(|status| f(&self[status]))
    }
}

impl<T> From<[T; 5]> for PerState<T> {
    fn from(values: [T; 5]) -> Self {
        PerState(values)
    }
}

impl<T> Index<InfectionStatus> for PerState<T> {
    type Output = T;

    #[inline]
    fn index(&self, status: InfectionStatus) -> &T {
        &self.0[status.index()]
    }
}

impl<T> IndexMut<InfectionStatus> for PerState<T> {
    #[inline]
    fn index_mut(&mut self, status: InfectionStatus) -> &mut T {
        &mut self.0[status.index()]
    }
}

// Serialized as `{"susceptible": .., "exposed": .., ...}` so downstream renderers don't have to
// know the compartment order.
impl<T: Serialize> Serialize for PerState<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(5))?;
        for (status, value) in self.iter() {
            map.serialize_entry(status.label(), value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use InfectionStatus::*;

    #[test]
    fn transitions_follow_the_disease_ordering() {
        assert!(Susceptible.can_transition_to(Exposed));
        assert!(Exposed.can_transition_to(Infected));
        assert!(Infected.can_transition_to(Dead));
        assert!(!Susceptible.can_transition_to(Dead));
        assert!(!Exposed.can_transition_to(Recovered));
        assert!(!Recovered.can_transition_to(Susceptible));
        assert!(!Dead.can_transition_to(Infected));
    }

    #[test]
    fn per_state_indexes_by_status() {
        let mut counts = PerState::new(96, 3, 1, 0, 0);
        counts[Recovered] += 2;
        assert_eq!(counts[Susceptible], 96);
        assert_eq!(counts[Recovered], 2);
        assert_eq!(counts.values().iter().sum::<i32>(), 102);

        let doubled = counts.map(|count| count * 2);
        assert_eq!(doubled[Exposed], 6);
    }

    #[test]
    fn per_state_serializes_with_labels() {
        let counts = PerState::new(1, 2, 3, 4, 5);
        let json = serde_json::to_string(&counts).unwrap();
        assert_eq!(
            json,
            r#"{"susceptible":1,"exposed":2,"infected":3,"recovered":4,"dead":5}"#
        );
    }
}
