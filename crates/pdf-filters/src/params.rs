use pdf_object::Dict;

/// Predictor parameters shared by `FlateDecode` and `LZWDecode` (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictorParams {
    pub predictor: i64,
    pub colors: i64,
    pub bits_per_component: i64,
    pub columns: i64,
}

impl Default for PredictorParams {
    fn default() -> Self {
        PredictorParams {
            predictor: 1,
            colors: 1,
            bits_per_component: 8,
            columns: 1,
        }
    }
}

impl PredictorParams {
    pub fn from_decode_parms(parms: Option<&Dict>) -> Self {
        let mut p = PredictorParams::default();
        let Some(parms) = parms else { return p };
        if let Some(v) = parms.int_entry(b"Predictor") {
            p.predictor = v;
        }
        if let Some(v) = parms.int_entry(b"Colors") {
            p.colors = v;
        }
        if let Some(v) = parms.int_entry(b"BitsPerComponent") {
            p.bits_per_component = v;
        }
        if let Some(v) = parms.int_entry(b"Columns") {
            p.columns = v;
        }
        p
    }

    pub fn bytes_per_pixel(&self) -> usize {
        (((self.colors * self.bits_per_component) as usize) + 7) / 8
    }

    pub fn row_bytes(&self) -> usize {
        (((self.colors * self.bits_per_component * self.columns) as usize) + 7) / 8
    }
}

/// Parameters for `CCITTFaxDecode` (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CcittParams {
    pub k: i64,
    pub columns: i64,
    pub rows: i64,
    pub black_is_1: bool,
    pub end_of_block: bool,
    pub end_of_line: bool,
    pub encoded_byte_align: bool,
}

impl Default for CcittParams {
    fn default() -> Self {
        CcittParams {
            k: 0,
            columns: 1728,
            rows: 0,
            black_is_1: false,
            end_of_block: true,
            end_of_line: false,
            encoded_byte_align: false,
        }
    }
}

impl CcittParams {
    pub fn from_decode_parms(parms: Option<&Dict>) -> Self {
        let mut p = CcittParams::default();
        let Some(parms) = parms else { return p };
        if let Some(v) = parms.int_entry(b"K") {
            p.k = v;
        }
        if let Some(v) = parms.int_entry(b"Columns") {
            p.columns = v;
        }
        if let Some(v) = parms.int_entry(b"Rows") {
            p.rows = v;
        }
        if let Some(v) = parms.boolean_entry(b"BlackIs1") {
            p.black_is_1 = v;
        }
        if let Some(v) = parms.boolean_entry(b"EndOfBlock") {
            p.end_of_block = v;
        }
        if let Some(v) = parms.boolean_entry(b"EndOfLine") {
            p.end_of_line = v;
        }
        if let Some(v) = parms.boolean_entry(b"EncodedByteAlign") {
            p.encoded_byte_align = v;
        }
        p
    }
}
