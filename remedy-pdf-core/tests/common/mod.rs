#![allow(dead_code)]

//! Builders for synthetic test documents.
//!
//! Everything goes through the public Document API and round-trips
//! through the writer, so the fixtures exercise the same code paths real
//! files do.

use remedy_pdf::document::{Document, ObjectId};
use remedy_pdf::parser::objects::{PdfArray, PdfDictionary, PdfObject, PdfStream};

pub fn reference(id: ObjectId) -> PdfObject {
    PdfObject::Reference(id.number, id.generation)
}

/// Add a content stream to `doc` and return its id.
pub fn content_stream(doc: &mut Document, content: &str) -> ObjectId {
    let mut dict = PdfDictionary::new();
    dict.insert("Length", PdfObject::Integer(content.len() as i64));
    doc.add(PdfObject::Stream(PdfStream {
        dict,
        data: content.as_bytes().to_vec(),
    }))
}

/// Append a page with the given content stream text and optional
/// resources.
pub fn text_page(doc: &mut Document, content: &str, resources: Option<PdfDictionary>) -> ObjectId {
    let content_id = content_stream(doc, content);
    let mut page = PdfDictionary::new();
    page.insert("Contents", reference(content_id));
    if let Some(resources) = resources {
        page.insert("Resources", PdfObject::Dictionary(resources));
    }
    doc.add_page(page).unwrap()
}

/// A document with `n` pages of plain text (25 words each, so four or
/// more pages cross the 100-word title threshold).
pub fn doc_with_text_pages(n: usize) -> Document {
    let mut doc = Document::new();
    for i in 0..n {
        let words: String = (0..25).map(|w| format!("word{i}x{w} ")).collect();
        text_page(
            &mut doc,
            &format!("BT /F1 12 Tf 72 700 Td ({words}) Tj ET"),
            None,
        );
    }
    doc
}

/// Create a StructElem dictionary object and return its id.
pub fn struct_elem(doc: &mut Document, role: &str) -> ObjectId {
    let mut dict = PdfDictionary::new();
    dict.insert("Type", PdfObject::name("StructElem"));
    dict.insert("S", PdfObject::name(role));
    doc.add(PdfObject::Dictionary(dict))
}

/// Install a StructTreeRoot whose kids are `root_kids`, with an optional
/// flat ParentTree.
pub fn install_struct_tree(
    doc: &mut Document,
    root_kids: &[ObjectId],
    parent_tree_nums: &[(i64, ObjectId)],
) -> ObjectId {
    let mut kids = PdfArray::new();
    for &kid in root_kids {
        kids.push(reference(kid));
    }
    let mut tree_root = PdfDictionary::new();
    tree_root.insert("Type", PdfObject::name("StructTreeRoot"));
    tree_root.insert("K", PdfObject::Array(kids));
    if !parent_tree_nums.is_empty() {
        let mut nums = PdfArray::new();
        for &(key, value) in parent_tree_nums {
            nums.push(PdfObject::Integer(key));
            nums.push(reference(value));
        }
        let mut parent_tree = PdfDictionary::new();
        parent_tree.insert("Nums", PdfObject::Array(nums));
        tree_root.insert("ParentTree", PdfObject::Dictionary(parent_tree));
    }
    let root_id = doc.add(PdfObject::Dictionary(tree_root));
    doc.set_catalog_entry("StructTreeRoot", reference(root_id))
        .unwrap();
    let mut mark_info = PdfDictionary::new();
    mark_info.insert("Marked", PdfObject::Boolean(true));
    doc.set_catalog_entry("MarkInfo", PdfObject::Dictionary(mark_info))
        .unwrap();
    root_id
}

/// A meaningfully tagged one-page document: an H1 heading with visible
/// text (MCID 0) and a Figure wrapping a JPEG image XObject (MCID 1,
/// plus an OBJR to the image). Returns (doc, heading id, figure id,
/// image id).
pub fn tagged_doc_with_heading_and_figure() -> (Document, ObjectId, ObjectId, ObjectId) {
    let mut doc = Document::new();

    // A JPEG image XObject (DCTDecode data is passed through verbatim).
    let mut image_dict = PdfDictionary::new();
    image_dict.insert("Subtype", PdfObject::name("Image"));
    image_dict.insert("Filter", PdfObject::name("DCTDecode"));
    image_dict.insert("Width", PdfObject::Integer(2));
    image_dict.insert("Height", PdfObject::Integer(2));
    let image_id = doc.add(PdfObject::Stream(PdfStream {
        dict: image_dict,
        data: vec![0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10, 0x4a, 0x46, 0xff, 0xd9],
    }));

    let mut xobjects = PdfDictionary::new();
    xobjects.insert("Im1", reference(image_id));
    let mut resources = PdfDictionary::new();
    resources.insert("XObject", PdfObject::Dictionary(xobjects));

    let content = "/H1 <</MCID 0>> BDC BT /F1 18 Tf 72 720 Td (Annual Review) Tj ET EMC \
                   BT /F1 11 Tf 72 690 Td (The chart below summarizes the totals for the year.) Tj ET \
                   /Figure <</MCID 1>> BDC q 200 0 0 150 72 500 cm /Im1 Do Q EMC";
    let page_id = text_page(&mut doc, content, Some(resources));

    let heading = struct_elem(&mut doc, "H1");
    {
        let dict = doc.get_dict_mut(heading).unwrap();
        dict.insert("Pg", reference(page_id));
        dict.insert("K", PdfObject::Integer(0));
    }

    let figure = struct_elem(&mut doc, "Figure");
    {
        let mut objr = PdfDictionary::new();
        objr.insert("Type", PdfObject::name("OBJR"));
        objr.insert("Obj", reference(image_id));
        let kids: PdfArray = vec![PdfObject::Integer(1), PdfObject::Dictionary(objr)]
            .into_iter()
            .collect();
        let dict = doc.get_dict_mut(figure).unwrap();
        dict.insert("Pg", reference(page_id));
        dict.insert("K", PdfObject::Array(kids));
    }

    let document_elem = struct_elem(&mut doc, "Document");
    {
        let kids: PdfArray = vec![reference(heading), reference(figure)].into_iter().collect();
        doc.get_dict_mut(document_elem)
            .unwrap()
            .insert("K", PdfObject::Array(kids));
    }
    install_struct_tree(&mut doc, &[document_elem], &[]);
    (doc, heading, figure, image_id)
}

/// A trivially tagged document: StructTreeRoot with a single Document
/// kid and no further structure.
pub fn trivially_tagged_doc(pages: usize) -> Document {
    let mut doc = doc_with_text_pages(pages);
    let document_elem = struct_elem(&mut doc, "Document");
    install_struct_tree(&mut doc, &[document_elem], &[]);
    doc
}

/// A tagged one-page document with two Figure elements whose MCIDs tag
/// identical vector rectangles (no raster images). Returns
/// (doc, figure ids).
pub fn tagged_doc_with_twin_vector_figures() -> (Document, Vec<ObjectId>) {
    let mut doc = Document::new();
    let content = "/Figure <</MCID 0>> BDC 100 600 50 50 re f EMC \
                   /Figure <</MCID 1>> BDC 300 600 50 50 re f EMC";
    let page_id = text_page(&mut doc, content, None);

    let mut figures = Vec::new();
    for mcid in 0..2 {
        let figure = struct_elem(&mut doc, "Figure");
        let dict = doc.get_dict_mut(figure).unwrap();
        dict.insert("Pg", reference(page_id));
        dict.insert("K", PdfObject::Integer(mcid));
        figures.push(figure);
    }
    let document_elem = struct_elem(&mut doc, "Document");
    {
        let kids: PdfArray = figures.iter().map(|&f| reference(f)).collect();
        doc.get_dict_mut(document_elem)
            .unwrap()
            .insert("K", PdfObject::Array(kids));
    }
    install_struct_tree(&mut doc, &[document_elem], &[]);
    (doc, figures)
}

/// Current `/Alt` of a structure element, decoded.
pub fn alt_of(doc: &Document, elem: ObjectId) -> Option<String> {
    doc.get_dict(elem)?
        .get("Alt")
        .and_then(|a| doc.resolve(a).as_string())
        .map(|s| s.to_text())
}

/// Current title, decoded.
pub fn title_of(doc: &Document) -> Option<String> {
    doc.info()?
        .get("Title")
        .and_then(|t| t.as_string())
        .map(|s| s.to_text())
}

/// Current catalog language, decoded.
pub fn lang_of(doc: &Document) -> Option<String> {
    doc.catalog()
        .ok()?
        .get("Lang")
        .and_then(|l| l.as_string())
        .map(|s| s.to_text())
}
