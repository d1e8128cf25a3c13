/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

/// Start of Frame (size information), coding process: baseline DCT
pub const SOF0: u8 = 0xC0;

/// Start of Frame (size information), coding process: extended sequential DCT
pub const SOF1: u8 = 0xC1;

/// Start of Frame (size information), coding process: progressive DCT
pub const SOF2: u8 = 0xC2;

/// Start of Frame, lossless (sequential)
pub const SOF3: u8 = 0xC3;

/// Huffman Table
pub const DHT: u8 = 0xC4;

/// Define arithmetic coding conditioning
pub const DAC: u8 = 0xCC;

/// Restart 0 segment
pub const RST0: u8 = 0xD0;

/// Restart 7 segment
pub const RST7: u8 = 0xD7;

/// Start of Image
pub const SOI: u8 = 0xD8;

/// End of Image, or End of File
pub const EOI: u8 = 0xD9;

/// Start of Scan
pub const SOS: u8 = 0xDA;

/// Define Quantization Table
pub const DQT: u8 = 0xDB;

/// Define restart interval
pub const DRI: u8 = 0xDD;

/// Application segment 0, used by JFIF
pub const APP0: u8 = 0xE0;

/// Application segment 15
pub const APP15: u8 = 0xEF;

/// Comment
pub const COM: u8 = 0xFE;

/// For temporary private use in arithmetic coding
pub const TEM: u8 = 0x01;

/// A marker found in the stream, classified by its code byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// baseline, extended sequential or progressive Huffman frame
    StartOfFrame { code: u8 },
    /// any other frame type (lossless, hierarchical or arithmetic coded)
    UnsupportedFrame { code: u8 },
    DefineHuffmanTable,
    DefineArithmeticConditioning,
    Restart(u8),
    StartOfImage,
    EndOfImage,
    StartOfScan,
    DefineQuantizationTable,
    DefineRestartInterval,
    /// APPn, where n is 0 to 15
    App(u8),
    Comment,
    /// any marker we don't know, including TEM and the reserved codes
    Unknown(u8),
}

impl Marker {
    pub fn from_code(code: u8) -> Marker {
        match code {
            SOF0 | SOF1 | SOF2 => Marker::StartOfFrame { code },
            SOF3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF => Marker::UnsupportedFrame { code },
            DHT => Marker::DefineHuffmanTable,
            DAC => Marker::DefineArithmeticConditioning,
            RST0..=RST7 => Marker::Restart(code - RST0),
            SOI => Marker::StartOfImage,
            EOI => Marker::EndOfImage,
            SOS => Marker::StartOfScan,
            DQT => Marker::DefineQuantizationTable,
            DRI => Marker::DefineRestartInterval,
            APP0..=APP15 => Marker::App(code - APP0),
            COM => Marker::Comment,
            _ => Marker::Unknown(code),
        }
    }

    /// true for the markers that stand alone without a length field
    pub fn is_standalone(&self) -> bool {
        match self {
            Marker::Restart(_) | Marker::StartOfImage | Marker::EndOfImage => true,
            Marker::Unknown(code) => *code == TEM,
            _ => false,
        }
    }
}

#[test]
fn marker_classification() {
    assert_eq!(Marker::from_code(0xC0), Marker::StartOfFrame { code: 0xC0 });
    assert_eq!(Marker::from_code(0xC2), Marker::StartOfFrame { code: 0xC2 });
    assert_eq!(Marker::from_code(0xC3), Marker::UnsupportedFrame { code: 0xC3 });
    assert_eq!(Marker::from_code(0xC9), Marker::UnsupportedFrame { code: 0xC9 });
    assert_eq!(Marker::from_code(0xC8), Marker::Unknown(0xC8));
    assert_eq!(Marker::from_code(0xD3), Marker::Restart(3));
    assert_eq!(Marker::from_code(0xE1), Marker::App(1));
    assert_eq!(Marker::from_code(0xEE), Marker::App(14));
    assert_eq!(Marker::from_code(0xFE), Marker::Comment);
    assert!(Marker::from_code(0xD9).is_standalone());
    assert!(!Marker::from_code(0xDA).is_standalone());
}
