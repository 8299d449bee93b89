//! Lane layout of the path segment an agent is currently driving on.
//!
//! The host reports every lane of the segment (including ones the agent
//! cannot use, such as sidewalks) together with the index of the lane the
//! agent occupies.  The dispatch core derives the available steering options
//! from this layout.

/// Travel direction of a lane relative to the segment's start→end axis.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LaneDirection {
    Forward,
    Backward,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Lane {
    /// Lateral offset from the segment centre line; smaller is further left.
    pub offset:    f32,
    pub direction: LaneDirection,
    /// `false` for lanes collection vehicles cannot use.
    pub drivable:  bool,
}

impl Lane {
    pub fn drivable(offset: f32, direction: LaneDirection) -> Self {
        Self { offset, direction, drivable: true }
    }
}

/// The agent's position within a segment's lane layout.
#[derive(Clone, Debug, PartialEq)]
pub struct LanePosition {
    pub lanes:   Vec<Lane>,
    /// Index into `lanes` of the lane the agent occupies.
    pub current: usize,
}

impl LanePosition {
    /// A plain two-way road: one drivable lane per direction, agent on the
    /// forward lane.
    pub fn two_way() -> Self {
        Self {
            lanes: vec![
                Lane::drivable(-2.0, LaneDirection::Backward),
                Lane::drivable(2.0, LaneDirection::Forward),
            ],
            current: 1,
        }
    }
}
