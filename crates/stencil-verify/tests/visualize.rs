//! Colored layer rendering. Kept in its own binary since it turns on
//! `console` colors process-wide.

use console::style;
use stencil_core::{Field, FieldCopy, FieldView, HostField, StorageMeta};
use stencil_verify::{
    BoundaryExtent, ErrorMetric, Verification, VerificationReporter, VerificationSpec,
};

#[test]
fn layer_masks_do_not_carry_over() {
    console::set_colors_enabled(true);
    let field = HostField::<f64>::new("u", StorageMeta::new(3, 3, 3));
    let reference = FieldCopy::new(&field);
    field.set(0, 0, 0, 1.0);
    field.set(2, 2, 2, 1.0);

    let mut v = Verification::new(
        FieldView::new(&field),
        reference.to_view(),
        BoundaryExtent::default(),
    );
    assert!(!v.verify(&ErrorMetric::default()).passed());

    let reporter = VerificationReporter::new(VerificationSpec::parse("visualize").unwrap());
    let mut out = Vec::new();
    reporter.report(&v, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    let pass = style("X ").green().to_string();
    let fail = style("X ").red().to_string();
    let blocks: Vec<&str> = text.split("\nk = ").skip(1).collect();
    assert_eq!(blocks.len(), 2);

    let k0: Vec<&str> = blocks[0].lines().collect();
    assert_eq!(k0[0], "0 (u)");
    assert_eq!(k0[4], format!("   | {fail}{pass}{pass} (  0,  0,  0)"));
    assert_eq!(k0[6], format!("   | {pass}{pass}{pass}"));

    // The failure at (0, 0, 0) must not show up in layer 2.
    let k2: Vec<&str> = blocks[1].lines().collect();
    assert_eq!(k2[0], "2 (u)");
    assert_eq!(k2[4], format!("   | {pass}{pass}{pass} (  2,  2,  2)"));
    assert_eq!(k2[5], format!(" i | {pass}{pass}{pass}"));
    assert_eq!(k2[6], format!("   | {pass}{pass}{fail}"));
}
