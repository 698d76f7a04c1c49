use bitflags::bitflags;

bitflags! {
    /// First byte of every snapshot message.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HeaderFlags: u8 {
        const POSITION = 1 << 0;
        const ROTATION = 1 << 1;
        const SCALE = 1 << 2;
        const VELOCITY = 1 << 3;
        const ANGULAR_VELOCITY = 1 << 4;
        const POSITIONAL_REST = 1 << 5;
        const ROTATIONAL_REST = 1 << 6;

        const CHANNELS = Self::POSITION.bits()
            | Self::ROTATION.bits()
            | Self::SCALE.bits()
            | Self::VELOCITY.bits()
            | Self::ANGULAR_VELOCITY.bits();
    }
}

/// Synchronized channels in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Position,
    Rotation,
    Scale,
    Velocity,
    AngularVelocity,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::Position,
        Channel::Rotation,
        Channel::Scale,
        Channel::Velocity,
        Channel::AngularVelocity,
    ];

    pub fn flag(self) -> HeaderFlags {
        match self {
            Channel::Position => HeaderFlags::POSITION,
            Channel::Rotation => HeaderFlags::ROTATION,
            Channel::Scale => HeaderFlags::SCALE,
            Channel::Velocity => HeaderFlags::VELOCITY,
            Channel::AngularVelocity => HeaderFlags::ANGULAR_VELOCITY,
        }
    }

    /// Angular channels travel in degrees and are halved in radians.
    pub fn is_angular(self) -> bool {
        matches!(self, Channel::Rotation | Channel::AngularVelocity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_bits_follow_wire_order() {
        let bits: Vec<u8> = Channel::ALL.iter().map(|c| c.flag().bits()).collect();
        assert_eq!(bits, vec![1, 2, 4, 8, 16]);
        assert_eq!(HeaderFlags::CHANNELS.bits(), 0b0001_1111);
        assert_eq!(HeaderFlags::all().bits() & 0x80, 0);
    }
}
