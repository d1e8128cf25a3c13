/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{stdout, BufReader, Cursor, IsTerminal, Read, Write};
use std::time::Duration;

use log::info;
use raster_jpeg::{
    decode_jpeg, get_version_string, identify_jpeg, CpuTimeMeasure, DecodePhase,
    EnabledFeatures, ExitCode, ImageMetadata, JpegDecoder, JpegError, Metrics, PixelSink, Result,
};
use simple_logger::SimpleLogger;

const USAGE: &str = "usage: raster_jpeg_util [--identify] [--dump] [--ignore-metadata] \
[--max-width N] [--max-height N] [--iter N] [--overwrite] <input.jpg> [output.bgra]";

struct Options {
    identify: bool,
    dump: bool,
    overwrite: bool,
    iterations: u32,
    enabled_features: EnabledFeatures,
    input: String,
    output: Option<String>,
}

fn syntax_error(message: impl AsRef<str>) -> JpegError {
    JpegError::new(ExitCode::SyntaxError, message)
}

fn parse_options(args: Vec<OsString>) -> Result<Options> {
    let mut pargs = pico_args::Arguments::from_vec(args);

    let mut enabled_features = EnabledFeatures::default();

    let identify = pargs.contains("--identify");
    let dump = pargs.contains("--dump");
    let overwrite = pargs.contains("--overwrite");
    enabled_features.ignore_metadata = pargs.contains("--ignore-metadata");

    let parse_u32 = |pargs: &mut pico_args::Arguments, name: &'static str| {
        pargs
            .opt_value_from_str::<_, u32>(name)
            .map_err(|e| syntax_error(format!("{0}: {1}", name, e)))
    };

    if let Some(w) = parse_u32(&mut pargs, "--max-width")? {
        enabled_features.max_jpeg_width = w;
    }
    if let Some(h) = parse_u32(&mut pargs, "--max-height")? {
        enabled_features.max_jpeg_height = h;
    }
    let iterations = parse_u32(&mut pargs, "--iter")?.unwrap_or(1).max(1);

    let mut filenames = Vec::new();
    for arg in pargs.finish() {
        let arg = arg.to_string_lossy().into_owned();
        if arg.starts_with("--") {
            return Err(syntax_error(format!("unknown switch {0}\n{1}", arg, USAGE)));
        }
        filenames.push(arg);
    }

    let mut filenames = filenames.into_iter();
    let input = match filenames.next() {
        Some(f) => f,
        None => return Err(syntax_error(USAGE)),
    };
    let output = filenames.next();

    if filenames.next().is_some() {
        return Err(syntax_error(format!("too many filenames\n{0}", USAGE)));
    }

    Ok(Options {
        identify,
        dump,
        overwrite,
        iterations,
        enabled_features,
        input,
        output,
    })
}

fn print_metadata(metadata: &ImageMetadata) {
    println!(
        "resolution: {0}x{1} dpi",
        metadata.horizontal_resolution, metadata.vertical_resolution
    );
    if let Some(exif) = &metadata.exif_profile {
        println!("exif: {0} bytes", exif.len());
    }
    if let Some(icc) = &metadata.icc_profile {
        println!("icc: {0} bytes", icc.len());
    }
}

/// prints the frame geometry and the tables of the image without running the post processor
fn dump(input_data: &[u8], enabled_features: &EnabledFeatures) -> Result<()> {
    let mut decoder = JpegDecoder::new(enabled_features.clone());
    decoder.parse_slice(input_data, false)?;

    if let Some(frame) = decoder.frame() {
        println!(
            "frame: {0}x{1} {2:?} precision={3} extended={4} color_space={5:?}",
            frame.samples_per_line,
            frame.scanlines,
            frame.jpeg_type,
            frame.precision,
            frame.extended,
            decoder.color_space()
        );
        println!(
            "mcus: {0}x{1} max sampling {2}x{3} restart interval {4}",
            frame.mcus_per_line,
            frame.mcus_per_column,
            frame.max_horizontal_factor,
            frame.max_vertical_factor,
            decoder.restart_interval()
        );

        for c in &frame.components {
            println!("{0:?}", c);
        }
    }

    for slot in 0..4 {
        if let Some(q) = decoder.tables().quantization_table(slot) {
            println!("quantization table {0}: {1:?}", slot, q);
        }
        println!(
            "huffman slot {0}: dc={1} ac={2}",
            slot,
            decoder.tables().dc_table(slot).is_some(),
            decoder.tables().ac_table(slot).is_some()
        );
    }

    if let Some(jfif) = decoder.jfif() {
        println!("{0:?}", jfif);
    }
    if let Some(adobe) = decoder.adobe() {
        println!("{0:?}", adobe);
    }
    print_metadata(decoder.metadata());
    decoder.metrics().print_metrics();

    Ok(())
}

// wrap main so that errors get printed nicely without a panic
fn main_with_result() -> Result<()> {
    let options = parse_options(std::env::args_os().skip(1).collect())?;

    // only output the log if we are connected to a console (otherwise if there is redirection we would corrupt the output)
    if stdout().is_terminal() {
        if let Err(e) = SimpleLogger::new().init() {
            eprintln!("unable to initialize logger: {0}", e);
        }
    }

    info!("raster_jpeg_util version {0}", get_version_string());

    let mut input_data = Vec::new();
    File::open(&options.input)
        .map_err(|e| JpegError::new(ExitCode::FileNotFound, e.to_string()))?
        .read_to_end(&mut input_data)?;

    if options.dump {
        return dump(&input_data, &options.enabled_features);
    }

    if options.identify {
        let image_info = identify_jpeg(Cursor::new(&input_data), &options.enabled_features)?;
        println!(
            "{0}x{1} {2} bits per pixel",
            image_info.width, image_info.height, image_info.bits_per_pixel
        );
        print_metadata(&image_info.metadata);
        return Ok(());
    }

    let mut overall_metrics = Metrics::default();
    let mut overall_cpu = Duration::ZERO;
    let mut image = None;

    for _ in 0..options.iterations {
        let thread_cpu = CpuTimeMeasure::new();

        let (decoded, metadata, metrics) =
            decode_jpeg(BufReader::new(Cursor::new(&input_data)), &options.enabled_features)?;

        info!(
            "decoded {0}x{1} in {2}ms (post process {3}ms)",
            decoded.width(),
            decoded.height(),
            thread_cpu.elapsed().as_millis(),
            metrics.get_phase_time(DecodePhase::PostProcess).as_millis()
        );

        overall_cpu += thread_cpu.elapsed();
        overall_metrics.merge_from(&metrics);
        image = Some((decoded, metadata));
    }

    if options.iterations > 1 {
        info!(
            "Overall average CPU consumed per iteration {0}ms ",
            overall_cpu.as_millis() / u128::from(options.iterations)
        );
        overall_metrics.print_metrics();
    }

    if let (Some(output_file), Some((decoded, metadata))) = (&options.output, &image) {
        let mut fileout = OpenOptions::new()
            .write(true)
            .create(options.overwrite)
            .truncate(options.overwrite)
            .create_new(!options.overwrite)
            .open(output_file)?;

        fileout.write_all(decoded.as_bytes())?;
        print_metadata(metadata);
    }

    Ok(())
}

fn main() {
    match main_with_result() {
        Ok(_) => {}
        Err(e) => {
            eprintln!(
                "error code: {0} {1} {2}",
                e.exit_code(),
                e.exit_code().as_integer_error_code(),
                e.message()
            );
            std::process::exit(e.exit_code().as_integer_error_code());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<OsString> {
        v.iter().map(OsString::from).collect()
    }

    #[test]
    fn options_are_parsed() {
        let o = parse_options(args(&[
            "--identify",
            "--max-width",
            "640",
            "--ignore-metadata",
            "in.jpg",
        ]))
        .unwrap();

        assert!(o.identify);
        assert!(!o.dump);
        assert_eq!(o.enabled_features.max_jpeg_width, 640);
        assert!(o.enabled_features.ignore_metadata);
        assert_eq!(o.input, "in.jpg");
        assert_eq!(o.output, None);
        assert_eq!(o.iterations, 1);
    }

    #[test]
    fn bad_options() {
        for a in [
            &["--bogus", "in.jpg"][..],
            &[][..],
            &["--max-height", "x", "in.jpg"][..],
            &["a.jpg", "b.bgra", "c"][..],
        ] {
            assert_eq!(
                parse_options(args(a)).err().unwrap().exit_code(),
                ExitCode::SyntaxError
            );
        }
    }
}
