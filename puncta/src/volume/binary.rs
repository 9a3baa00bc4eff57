use common::Buffer3;

/// Binary volume with foreground stored as [`BinaryVolume::FOREGROUND`].
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryVolume {
    data: Buffer3<u8>,
}

impl BinaryVolume {
    pub const FOREGROUND: u8 = u8::MAX;
    pub const BACKGROUND: u8 = 0;

    pub fn new(data: Buffer3<u8>) -> Self {
        debug_assert!(data
            .iter()
            .all(|&v| v == Self::FOREGROUND || v == Self::BACKGROUND));
        Self { data }
    }

    pub fn data(&self) -> &Buffer3<u8> {
        &self.data
    }

    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&v| v == Self::FOREGROUND).count()
    }

    /// Divide by the foreground value so the mask holds `{0, 1}`.
    pub fn normalize(self) -> Mask {
        let data = self.data.map(|&v| v / Self::FOREGROUND);
        Mask { data }
    }
}

/// Cell-volume mask with values in `{0, 1}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    data: Buffer3<u8>,
}

impl Mask {
    pub fn data(&self) -> &Buffer3<u8> {
        &self.data
    }

    pub fn count_ones(&self) -> usize {
        self.data.iter().filter(|&&v| v == 1).count()
    }
}
